// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic retry/backoff decisions for the worker pool runtime.
//!
//! Delay growth is exponential (`base * 2^attempt`, capped), and the jitter
//! applied on top is not random: it is derived from a SHA-256 digest of the
//! envelope's identity and the attempt number, so the same `(envelope,
//! attempt)` pair always produces the same delay — useful for tests and for
//! reasoning about worst-case queue drain time.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use chartly_envelope::Envelope;
use std::time::Duration;

/// Default ceiling on retry attempts before a message is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default initial backoff delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(250);
/// Default backoff ceiling.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
/// Default jitter percentage applied to every computed delay.
pub const DEFAULT_JITTER_PCT: u8 = 20;
/// Jitter percentages above this are clamped; a wider spread would make
/// delays unpredictable enough to defeat the purpose of backoff.
pub const MAX_JITTER_PCT: u8 = 50;
/// Attempt exponents beyond this are clamped before shifting, so a runaway
/// attempt counter can never overflow the `2^attempt` computation.
pub const MAX_ATTEMPT_SHIFT: u32 = 20;

/// The outcome of [`RetryPolicy::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryDecision {
    /// Route the message to the dead-letter queue instead of retrying.
    pub to_dlq: bool,
    /// How long to delay before the message becomes visible again. Ignored
    /// when `to_dlq` is true.
    pub delay: Duration,
    /// Why the decision went the way it did, e.g.
    /// `"max_attempts_exceeded:10"`.
    pub reason: Option<String>,
}

/// A pluggable policy deciding what happens after a handler error.
pub trait RetryPolicy: Send + Sync {
    /// Decide whether `envelope` (whose handler failed with `err`) should be
    /// dead-lettered or retried, and after how long.
    fn decide(&self, envelope: &Envelope, err: &str) -> RetryDecision;
}

/// The platform's standard exponential-backoff-with-deterministic-jitter
/// policy.
#[derive(Debug, Clone, Copy)]
pub struct DefaultRetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_pct: u8,
}

impl Default for DefaultRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_pct: DEFAULT_JITTER_PCT,
        }
    }
}

impl DefaultRetryPolicy {
    /// The default policy: 10 attempts, 250ms base, 30s cap, 20% jitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the attempt ceiling.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Override the initial backoff delay.
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Override the backoff ceiling.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Override the jitter percentage. Clamped to [`MAX_JITTER_PCT`].
    #[must_use]
    pub fn with_jitter_pct(mut self, jitter_pct: u8) -> Self {
        self.jitter_pct = jitter_pct.min(MAX_JITTER_PCT);
        self
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn decide(&self, envelope: &Envelope, _err: &str) -> RetryDecision {
        if envelope.attempt >= self.max_attempts {
            return RetryDecision {
                to_dlq: true,
                delay: Duration::ZERO,
                reason: Some(format!("max_attempts_exceeded:{}", self.max_attempts)),
            };
        }

        let shift = envelope.attempt.min(MAX_ATTEMPT_SHIFT);
        let grown = self.base_delay.saturating_mul(1u32 << shift);
        let capped = grown.min(self.max_delay);
        let delay = apply_jitter(
            capped,
            self.jitter_pct,
            &[
                envelope.queue_name.as_str(),
                envelope.id.as_str(),
                envelope.type_.as_str(),
                envelope.tenant.as_deref().unwrap_or(""),
                &envelope.attempt.to_string(),
            ],
        );

        RetryDecision { to_dlq: false, delay, reason: None }
    }
}

/// Deterministically perturb `base` by a fraction in `[-pct, +pct]` percent,
/// derived from a SHA-256 digest of `parts` joined by NUL bytes.
///
/// Identical `(base, pct, parts)` always produce the identical delay.
#[must_use]
pub fn apply_jitter(base: Duration, pct: u8, parts: &[&str]) -> Duration {
    let clamped_pct = f64::from(pct.min(MAX_JITTER_PCT));
    let joined = parts.join("\u{0}");
    let digest = chartly_canon::sha256_hex(joined.as_bytes());
    let seed = u64::from_str_radix(&digest[0..16], 16).unwrap_or(0);
    let unit = seed as f64 / u64::MAX as f64; // [0, 1)
    let fraction = (unit * 2.0 - 1.0) * (clamped_pct / 100.0); // [-pct%, +pct%]

    let base_secs = base.as_secs_f64();
    let jittered_secs = (base_secs * (1.0 + fraction)).max(0.0);
    Duration::from_secs_f64(jittered_secs)
}
