// SPDX-License-Identifier: MIT OR Apache-2.0
//! The consumer-side worker pool runtime: bounded-concurrency workers
//! draining a [`chartly_envelope::QueueBackend`], dispatching to a
//! [`MessageHandler`], and routing failures through a
//! [`chartly_retry::RetryPolicy`] with metrics emitted via
//! [`chartly_telemetry::Meter`].
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod handler;
mod pool;

pub use cancel::CancellationToken;
pub use handler::MessageHandler;
pub use pool::{WorkerPool, WorkerPoolConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::CountingHandler;
    use async_trait::async_trait;
    use chartly_envelope::{DequeueOutcome, Envelope, QueueBackend, Receipt};
    use chartly_error::ChartlyError;
    use chartly_retry::DefaultRetryPolicy;
    use chartly_telemetry::{runtime_metrics, InMemoryMeter, NoopLogHook};
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct InMemoryQueue {
        pending: Mutex<VecDeque<Envelope>>,
        acked: Mutex<Vec<String>>,
        dead_lettered: Mutex<Vec<String>>,
    }

    impl InMemoryQueue {
        fn with_messages(messages: Vec<Envelope>) -> Self {
            Self {
                pending: Mutex::new(messages.into()),
                acked: Mutex::new(Vec::new()),
                dead_lettered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QueueBackend for InMemoryQueue {
        async fn dequeue(
            &self,
            _queue: &str,
            _poll_timeout: Duration,
            _visibility_timeout: Duration,
        ) -> Result<DequeueOutcome, ChartlyError> {
            let mut pending = self.pending.lock().expect("lock poisoned");
            match pending.pop_front() {
                Some(envelope) => {
                    let receipt = Receipt::new(envelope.id.clone());
                    Ok(DequeueOutcome::Message(envelope, receipt))
                }
                None => Ok(DequeueOutcome::Empty),
            }
        }

        async fn ack(&self, _queue: &str, receipt: &Receipt) -> Result<(), ChartlyError> {
            self.acked.lock().expect("lock poisoned").push(receipt.as_str().to_string());
            Ok(())
        }

        async fn nack(&self, _queue: &str, _receipt: &Receipt, _delay: chrono::Duration) -> Result<(), ChartlyError> {
            Ok(())
        }

        async fn nack_with_deadletter(
            &self,
            _queue: &str,
            receipt: &Receipt,
            _delay: chrono::Duration,
            _reason: &str,
        ) -> Result<(), ChartlyError> {
            self.dead_lettered.lock().expect("lock poisoned").push(receipt.as_str().to_string());
            Ok(())
        }

        async fn extend_visibility(
            &self,
            _queue: &str,
            _receipt: &Receipt,
            _visibility_timeout: Duration,
        ) -> Result<(), ChartlyError> {
            Ok(())
        }
    }

    fn envelope(id: &str) -> Envelope {
        Envelope::new("orders", id, "order.created", Utc::now())
    }

    #[tokio::test]
    async fn successful_handler_acks_the_message() {
        let queue = Arc::new(InMemoryQueue::with_messages(vec![envelope("evt-1")]));
        let handler = Arc::new(CountingHandler { calls: Arc::new(AtomicUsize::new(0)), fail_until: 0 });
        let meter = Arc::new(InMemoryMeter::new());
        let pool = Arc::new(WorkerPool::new(
            "orders",
            queue.clone(),
            handler,
            Arc::new(DefaultRetryPolicy::new()),
            meter.clone(),
            Arc::new(NoopLogHook),
            WorkerPoolConfig::new(1),
        ));

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stop.cancel();
        });
        pool.run(cancel).await.unwrap();

        assert_eq!(queue.acked.lock().unwrap().len(), 1);
        assert_eq!(meter.counter(runtime_metrics::ACK), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_route_to_dead_letter() {
        let mut e = envelope("evt-2");
        e.attempt = 10;
        let queue = Arc::new(InMemoryQueue::with_messages(vec![e]));
        let handler = Arc::new(CountingHandler { calls: Arc::new(AtomicUsize::new(0)), fail_until: usize::MAX });
        let meter = Arc::new(InMemoryMeter::new());
        let pool = Arc::new(WorkerPool::new(
            "orders",
            queue.clone(),
            handler,
            Arc::new(DefaultRetryPolicy::new()),
            meter.clone(),
            Arc::new(NoopLogHook),
            WorkerPoolConfig::new(1),
        ));

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stop.cancel();
        });
        pool.run(cancel).await.unwrap();

        assert_eq!(queue.dead_lettered.lock().unwrap().len(), 1);
        assert_eq!(meter.counter(runtime_metrics::DLQ), 1);
    }

    #[tokio::test]
    async fn empty_queue_eventually_observes_cancellation() {
        let queue = Arc::new(InMemoryQueue::with_messages(Vec::new()));
        let handler = Arc::new(CountingHandler { calls: Arc::new(AtomicUsize::new(0)), fail_until: 0 });
        let meter = Arc::new(InMemoryMeter::new());
        let mut config = WorkerPoolConfig::new(1);
        config.empty_backoff_min = Duration::from_millis(10);
        config.empty_backoff_max = Duration::from_millis(20);
        let pool = Arc::new(WorkerPool::new(
            "orders",
            queue,
            handler,
            Arc::new(DefaultRetryPolicy::new()),
            meter.clone(),
            Arc::new(NoopLogHook),
            config,
        ));

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stop.cancel();
        });
        pool.run(cancel).await.unwrap();

        assert!(meter.counter(runtime_metrics::DEQUEUE_EMPTY) > 0);
    }

    #[test]
    fn worker_pool_config_clamps_concurrency_into_range() {
        assert_eq!(WorkerPoolConfig::new(0).concurrency, 1);
        assert_eq!(WorkerPoolConfig::new(1000).concurrency, 256);
    }
}
