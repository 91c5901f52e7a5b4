// SPDX-License-Identifier: MIT OR Apache-2.0
use async_trait::async_trait;
use chartly_envelope::{DequeueOutcome, Envelope, QueueBackend, Receipt};
use chartly_error::ChartlyError;
use chartly_retry::DefaultRetryPolicy;
use chartly_runtime::{CancellationToken, WorkerPool, WorkerPoolConfig};
use chartly_telemetry::{runtime_metrics, InMemoryMeter, NoopLogHook};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct HandlerAlwaysOk;

#[async_trait]
impl chartly_runtime::MessageHandler for HandlerAlwaysOk {
    async fn handle(&self, _envelope: &Envelope) -> Result<(), String> {
        Ok(())
    }
}

/// A queue backend whose `ack` always fails, so a successful handler run
/// must fall back to a short `nack` to let the lease expire cleanly.
struct AckAlwaysFailsQueue {
    pending: Mutex<VecDeque<Envelope>>,
    nack_calls: Mutex<Vec<chrono::Duration>>,
}

#[async_trait]
impl QueueBackend for AckAlwaysFailsQueue {
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

    async fn ack(&self, _queue: &str, _receipt: &Receipt) -> Result<(), ChartlyError> {
        Err(ChartlyError::new(chartly_error::ErrorCode::QueueConflict, "stale receipt"))
    }

    async fn nack(&self, _queue: &str, _receipt: &Receipt, delay: chrono::Duration) -> Result<(), ChartlyError> {
        self.nack_calls.lock().expect("lock poisoned").push(delay);
        Ok(())
    }

    async fn nack_with_deadletter(
        &self,
        _queue: &str,
        _receipt: &Receipt,
        _delay: chrono::Duration,
        _reason: &str,
    ) -> Result<(), ChartlyError> {
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

#[tokio::test]
async fn ack_failure_falls_back_to_a_one_second_nack() {
    let envelope = Envelope::new("orders", "evt-1", "order.created", Utc::now());
    let queue = Arc::new(AckAlwaysFailsQueue {
        pending: Mutex::new(VecDeque::from(vec![envelope])),
        nack_calls: Mutex::new(Vec::new()),
    });
    let meter = Arc::new(InMemoryMeter::new());
    let pool = Arc::new(WorkerPool::new(
        "orders",
        queue.clone(),
        Arc::new(HandlerAlwaysOk),
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

    let nacks = queue.nack_calls.lock().unwrap();
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0], chrono::Duration::seconds(1));
    assert_eq!(meter.counter(runtime_metrics::ACK_ERROR), 1);
}
