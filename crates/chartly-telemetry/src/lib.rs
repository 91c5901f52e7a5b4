// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pluggable metrics and structured-logging contracts.
//!
//! The worker runtime, scheduler, and router never call a concrete metrics
//! backend directly — they hold a `dyn Meter` and a `dyn LogHook`, chosen by
//! the embedding service at construction time. This crate defines those two
//! capability traits plus a [`NoopMeter`]/[`NoopLogHook`] pair for tests and
//! an [`InMemoryMeter`] that records counters and histogram samples for
//! assertions in integration tests.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Mutex;

/// A single label attached to a metric observation.
pub type Label<'a> = (&'a str, &'a str);

/// Severity of a structured log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Fine-grained diagnostic detail.
    Debug,
    /// Normal operational events.
    Info,
    /// Recoverable anomalies.
    Warn,
    /// Failures requiring attention.
    Error,
}

/// Counters and histograms a Chartly service component may emit.
///
/// Implementations forward to whatever metrics backend the embedding
/// service uses (Prometheus, StatsD, ...); this crate only defines the
/// shape of the call.
pub trait Meter: Send + Sync {
    /// Increment a monotonic counter by `value`.
    fn incr_counter(&self, name: &str, value: u64, labels: &[Label<'_>]);

    /// Record a single observation into a histogram.
    fn observe_histogram(&self, name: &str, value: f64, labels: &[Label<'_>]);
}

/// Structured logging hook: `(level, event, fields)`.
///
/// Implementations typically forward to `tracing`; [`TracingLogHook`]
/// provides that default. Tests substitute [`NoopLogHook`] or capture
/// events with a custom implementation.
pub trait LogHook: Send + Sync {
    /// Emit a structured log event.
    fn log(&self, level: LogLevel, event: &str, fields: &BTreeMap<String, serde_json::Value>);
}

// ---------------------------------------------------------------------------
// Noop implementations
// ---------------------------------------------------------------------------

/// A [`Meter`] that discards every observation. The default for components
/// constructed without an explicit metrics backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMeter;

impl Meter for NoopMeter {
    fn incr_counter(&self, _name: &str, _value: u64, _labels: &[Label<'_>]) {}
    fn observe_histogram(&self, _name: &str, _value: f64, _labels: &[Label<'_>]) {}
}

/// A [`LogHook`] that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogHook;

impl LogHook for NoopLogHook {
    fn log(&self, _level: LogLevel, _event: &str, _fields: &BTreeMap<String, serde_json::Value>) {}
}

// ---------------------------------------------------------------------------
// Tracing-backed implementation
// ---------------------------------------------------------------------------

/// A [`LogHook`] that forwards to the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogHook;

impl LogHook for TracingLogHook {
    fn log(&self, level: LogLevel, event: &str, fields: &BTreeMap<String, serde_json::Value>) {
        // Deterministic field ordering thanks to BTreeMap.
        let fields_json = serde_json::to_string(fields).unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(event, fields = %fields_json),
            LogLevel::Info => tracing::info!(event, fields = %fields_json),
            LogLevel::Warn => tracing::warn!(event, fields = %fields_json),
            LogLevel::Error => tracing::error!(event, fields = %fields_json),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (tests / embedders without a metrics backend yet)
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MeterState {
    counters: BTreeMap<String, u64>,
    histograms: BTreeMap<String, Vec<f64>>,
}

/// An in-memory [`Meter`] that records every observation for later
/// inspection. Useful in integration tests asserting that the worker
/// runtime emitted the metric names named in the platform spec
/// (`dequeue_empty`, `ack`, `retry`, `dlq`, `handle_duration`, ...).
#[derive(Debug, Default)]
pub struct InMemoryMeter {
    state: Mutex<MeterState>,
}

impl InMemoryMeter {
    /// Create an empty meter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter (0 if never incremented).
    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        self.state
            .lock()
            .expect("meter lock poisoned")
            .counters
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// All recorded samples for a histogram, in observation order.
    #[must_use]
    pub fn histogram_samples(&self, name: &str) -> Vec<f64> {
        self.state
            .lock()
            .expect("meter lock poisoned")
            .histograms
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

impl Meter for InMemoryMeter {
    fn incr_counter(&self, name: &str, value: u64, _labels: &[Label<'_>]) {
        let mut state = self.state.lock().expect("meter lock poisoned");
        *state.counters.entry(name.to_string()).or_insert(0) += value;
    }

    fn observe_histogram(&self, name: &str, value: f64, _labels: &[Label<'_>]) {
        let mut state = self.state.lock().expect("meter lock poisoned");
        state
            .histograms
            .entry(name.to_string())
            .or_default()
            .push(value);
    }
}

/// Names of the standard worker-pool-runtime metrics, as fixed by the
/// platform spec's observability section.
pub mod runtime_metrics {
    /// Emitted when a dequeue poll found no message.
    pub const DEQUEUE_EMPTY: &str = "dequeue_empty";
    /// Emitted when a dequeue call returned an error.
    pub const DEQUEUE_ERROR: &str = "dequeue_error";
    /// Emitted on successful ack.
    pub const ACK: &str = "ack";
    /// Emitted when ack itself failed.
    pub const ACK_ERROR: &str = "ack_error";
    /// Emitted on nack.
    pub const NACK: &str = "nack";
    /// Emitted when nack itself failed.
    pub const NACK_ERROR: &str = "nack_error";
    /// Emitted when a handler error is routed to retry.
    pub const RETRY: &str = "retry";
    /// Emitted when a message is routed to the dead-letter queue.
    pub const DLQ: &str = "dlq";
    /// Histogram of handler execution duration, in milliseconds.
    pub const HANDLE_DURATION: &str = "handle_duration";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_meter_accumulates_counters() {
        let meter = InMemoryMeter::new();
        meter.incr_counter(runtime_metrics::ACK, 1, &[]);
        meter.incr_counter(runtime_metrics::ACK, 2, &[]);
        assert_eq!(meter.counter(runtime_metrics::ACK), 3);
        assert_eq!(meter.counter(runtime_metrics::NACK), 0);
    }

    #[test]
    fn in_memory_meter_records_histogram_samples_in_order() {
        let meter = InMemoryMeter::new();
        meter.observe_histogram(runtime_metrics::HANDLE_DURATION, 12.5, &[]);
        meter.observe_histogram(runtime_metrics::HANDLE_DURATION, 7.0, &[]);
        assert_eq!(
            meter.histogram_samples(runtime_metrics::HANDLE_DURATION),
            vec![12.5, 7.0]
        );
    }

    #[test]
    fn noop_meter_never_panics() {
        let meter = NoopMeter;
        meter.incr_counter("x", 1, &[("tenant", "t")]);
        meter.observe_histogram("y", 1.0, &[]);
    }

    #[test]
    fn noop_log_hook_never_panics() {
        let hook = NoopLogHook;
        hook.log(LogLevel::Error, "boom", &BTreeMap::new());
    }
}
