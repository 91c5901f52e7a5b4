// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::cancel::CancellationToken;
use crate::handler::MessageHandler;
use chartly_envelope::{DequeueOutcome, Envelope, QueueBackend, Receipt};
use chartly_error::{ChartlyError, ErrorCode};
use chartly_retry::{apply_jitter, RetryPolicy};
use chartly_telemetry::{runtime_metrics, LogHook, LogLevel, Meter};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Tunables for a [`WorkerPool`]. `concurrency` is clamped to `1..=256` by
/// [`WorkerPoolConfig::new`].
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of concurrent worker tasks.
    pub concurrency: u32,
    /// How long a single `dequeue` call may block waiting for a message.
    pub poll_timeout: Duration,
    /// Lease duration granted to a dequeued message.
    pub visibility_timeout: Duration,
    /// Shortest backoff after an empty poll.
    pub empty_backoff_min: Duration,
    /// Longest backoff after consecutive empty polls.
    pub empty_backoff_max: Duration,
    /// Jitter percentage applied to empty-poll backoff, clamped to 50.
    pub empty_backoff_jitter_pct: u8,
    /// Consecutive dequeue errors tolerated before the worker returns fatal.
    pub max_consecutive_errors: u32,
    /// Optional per-message handler deadline; `None` means unbounded.
    pub handler_timeout: Option<Duration>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_timeout: Duration::from_secs(5),
            visibility_timeout: Duration::from_secs(30),
            empty_backoff_min: Duration::from_millis(100),
            empty_backoff_max: Duration::from_secs(10),
            empty_backoff_jitter_pct: 20,
            max_consecutive_errors: 10,
            handler_timeout: None,
        }
    }
}

impl WorkerPoolConfig {
    /// Build a config with `concurrency` clamped to `1..=256`.
    #[must_use]
    pub fn new(concurrency: u32) -> Self {
        Self { concurrency: concurrency.clamp(1, 256), ..Self::default() }
    }
}

/// A bounded pool of worker tasks consuming `queue_name` from a
/// [`QueueBackend`], dispatching each message to a [`MessageHandler`], and
/// routing failures through a [`RetryPolicy`].
pub struct WorkerPool {
    queue_name: String,
    backend: Arc<dyn QueueBackend>,
    handler: Arc<dyn MessageHandler>,
    retry_policy: Arc<dyn RetryPolicy>,
    meter: Arc<dyn Meter>,
    log: Arc<dyn LogHook>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    /// Construct a worker pool. Does not start consuming until
    /// [`WorkerPool::run`] is called.
    #[must_use]
    pub fn new(
        queue_name: impl Into<String>,
        backend: Arc<dyn QueueBackend>,
        handler: Arc<dyn MessageHandler>,
        retry_policy: Arc<dyn RetryPolicy>,
        meter: Arc<dyn Meter>,
        log: Arc<dyn LogHook>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self { queue_name: queue_name.into(), backend, handler, retry_policy, meter, log, config }
    }

    /// Spawn `config.concurrency` worker tasks and run them until `cancel`
    /// fires or one returns a fatal dequeue error.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`ChartlyError`] encountered by any worker
    /// (a `dequeue` failure repeated `max_consecutive_errors` times, or a
    /// worker task panicking).
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), ChartlyError> {
        let mut handles = Vec::with_capacity(self.config.concurrency as usize);
        for worker_index in 0..self.config.concurrency {
            let pool = Arc::clone(&self);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move { pool.worker_loop(worker_index, cancel).await }));
        }

        let mut first_err = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_err.get_or_insert(e);
                }
                Err(join_err) => {
                    first_err.get_or_insert(ChartlyError::new(ErrorCode::Internal, join_err.to_string()));
                }
            };
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn worker_loop(&self, worker_index: u32, cancel: CancellationToken) -> Result<(), ChartlyError> {
        let mut consecutive_errors: u32 = 0;
        let mut empty_streak: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let outcome =
                self.backend.dequeue(&self.queue_name, self.config.poll_timeout, self.config.visibility_timeout).await;

            match outcome {
                Ok(DequeueOutcome::Empty) => {
                    self.meter.incr_counter(runtime_metrics::DEQUEUE_EMPTY, 1, &[]);
                    consecutive_errors = 0;
                    empty_streak += 1;
                    let sleep_for = self.empty_backoff(worker_index, empty_streak);
                    tokio::select! {
                        () = tokio::time::sleep(sleep_for) => {}
                        () = cancel.cancelled() => return Ok(()),
                    }
                }
                Err(err) => {
                    self.meter.incr_counter(runtime_metrics::DEQUEUE_ERROR, 1, &[]);
                    consecutive_errors += 1;
                    if consecutive_errors >= self.config.max_consecutive_errors {
                        return Err(err);
                    }
                    tokio::select! {
                        () = tokio::time::sleep(Duration::from_millis(250)) => {}
                        () = cancel.cancelled() => return Ok(()),
                    }
                }
                Ok(DequeueOutcome::Message(envelope, receipt)) => {
                    consecutive_errors = 0;
                    empty_streak = 0;
                    self.handle_message(envelope, receipt).await;
                }
            }
        }
    }

    /// Deterministic backoff for `empty_streak` consecutive empty polls on
    /// `worker_index`, grown exponentially from `empty_backoff_min` up to
    /// `empty_backoff_max` with jitter seeded by the queue name, worker
    /// index, and streak length.
    fn empty_backoff(&self, worker_index: u32, empty_streak: u64) -> Duration {
        let shift = u32::try_from(empty_streak.min(20)).unwrap_or(20);
        let grown = self.config.empty_backoff_min.saturating_mul(1u32 << shift);
        let capped = grown.min(self.config.empty_backoff_max);
        apply_jitter(
            capped,
            self.config.empty_backoff_jitter_pct,
            &[&self.queue_name, &worker_index.to_string(), &empty_streak.to_string()],
        )
    }

    async fn handle_message(&self, envelope: Envelope, receipt: Receipt) {
        let started = std::time::Instant::now();
        let result = match self.config.handler_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.handler.handle(&envelope)).await {
                Ok(handler_result) => handler_result,
                Err(_) => Err("handler_timeout".to_string()),
            },
            None => self.handler.handle(&envelope).await,
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.meter.observe_histogram(runtime_metrics::HANDLE_DURATION, elapsed_ms, &[]);

        match result {
            Ok(()) => self.ack_or_nack(&envelope, &receipt).await,
            Err(err) => self.retry_or_deadletter(&envelope, &receipt, &err).await,
        }
    }

    async fn ack_or_nack(&self, envelope: &Envelope, receipt: &Receipt) {
        match self.backend.ack(&self.queue_name, receipt).await {
            Ok(()) => self.meter.incr_counter(runtime_metrics::ACK, 1, &[]),
            Err(err) => {
                self.meter.incr_counter(runtime_metrics::ACK_ERROR, 1, &[]);
                self.log_event(LogLevel::Warn, "ack_failed", envelope, Some(&err.to_string()));
                let _ = self.backend.nack(&self.queue_name, receipt, chrono::Duration::seconds(1)).await;
            }
        }
    }

    async fn retry_or_deadletter(&self, envelope: &Envelope, receipt: &Receipt, err: &str) {
        let decision = self.retry_policy.decide(envelope, err);
        let delay = chrono::Duration::from_std(decision.delay).unwrap_or_else(|_| chrono::Duration::zero());

        if decision.to_dlq {
            self.meter.incr_counter(runtime_metrics::DLQ, 1, &[]);
            let reason = decision.reason.as_deref().unwrap_or(err);
            self.log_event(LogLevel::Error, "dead_lettered", envelope, Some(reason));
            if self.backend.nack_with_deadletter(&self.queue_name, receipt, delay, reason).await.is_err() {
                let _ = self.backend.nack(&self.queue_name, receipt, delay).await;
            }
        } else {
            self.meter.incr_counter(runtime_metrics::RETRY, 1, &[]);
            self.log_event(LogLevel::Warn, "retry_scheduled", envelope, Some(err));
            match self.backend.nack(&self.queue_name, receipt, delay).await {
                Ok(()) => self.meter.incr_counter(runtime_metrics::NACK, 1, &[]),
                Err(_) => self.meter.incr_counter(runtime_metrics::NACK_ERROR, 1, &[]),
            }
        }
    }

    fn log_event(&self, level: LogLevel, event: &str, envelope: &Envelope, detail: Option<&str>) {
        let mut fields = BTreeMap::new();
        fields.insert("queue".to_string(), json!(self.queue_name));
        fields.insert("envelope_id".to_string(), json!(envelope.id));
        fields.insert("type".to_string(), json!(envelope.type_));
        fields.insert("attempt".to_string(), json!(envelope.attempt));
        if let Some(tenant) = &envelope.tenant {
            fields.insert("tenant".to_string(), json!(tenant));
        }
        if let Some(detail) = detail {
            fields.insert("detail".to_string(), json!(detail));
        }
        self.log.log(level, event, &fields);
    }
}
