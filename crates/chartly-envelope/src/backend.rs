// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::Envelope;
use async_trait::async_trait;
use chartly_error::ChartlyError;
use chrono::Duration;
use std::time::Duration as StdDuration;

/// An opaque, backend-issued lease token for a dequeued envelope.
///
/// Callers must treat the inner value as opaque; only the backend that
/// issued it can interpret it on [`QueueBackend::ack`],
/// [`QueueBackend::nack`], or [`QueueBackend::extend_visibility`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt(pub String);

impl Receipt {
    /// Wrap a backend-issued token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the opaque token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of a [`QueueBackend::dequeue`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DequeueOutcome {
    /// No message was available within the poll timeout.
    Empty,
    /// A leased message, with the [`Receipt`] needed to ack/nack/extend it.
    Message(Envelope, Receipt),
}

/// Capability set a concrete queue implementation (Redis streams, SQS, an
/// in-memory mock) must provide to participate in the worker-pool runtime.
///
/// Every method takes `queue` explicitly rather than assuming a backend is
/// bound to a single queue, so one backend instance can serve many queues.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Lease the next available envelope from `queue`, waiting up to
    /// `poll_timeout` for one to arrive. The lease is held for
    /// `visibility_timeout`, after which the backend makes the message
    /// visible to other consumers again unless extended or acked.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] on a backend failure (connectivity, a
    /// malformed stored envelope, etc).
    async fn dequeue(
        &self,
        queue: &str,
        poll_timeout: StdDuration,
        visibility_timeout: StdDuration,
    ) -> Result<DequeueOutcome, ChartlyError>;

    /// Acknowledge successful processing, permanently removing the message.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] if the receipt is unknown or already expired.
    async fn ack(&self, queue: &str, receipt: &Receipt) -> Result<(), ChartlyError>;

    /// Return the message to `queue` for redelivery after `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] if the receipt is unknown or already expired.
    async fn nack(&self, queue: &str, receipt: &Receipt, delay: Duration) -> Result<(), ChartlyError>;

    /// Ask the backend to move the message to `queue`'s dead-letter queue,
    /// recording `reason` for operator visibility. The backend decides: if
    /// the message's attempt count has reached its limit it is moved to the
    /// DLQ; otherwise it is requeued for redelivery after `delay`, exactly
    /// as [`QueueBackend::nack`] would.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] if the receipt is unknown or already expired.
    async fn nack_with_deadletter(
        &self,
        queue: &str,
        receipt: &Receipt,
        delay: Duration,
        reason: &str,
    ) -> Result<(), ChartlyError>;

    /// Extend the lease on an in-flight message, for handlers that need
    /// longer than the original `visibility_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] if the receipt is unknown or already expired.
    async fn extend_visibility(
        &self,
        queue: &str,
        receipt: &Receipt,
        visibility_timeout: StdDuration,
    ) -> Result<(), ChartlyError>;
}
