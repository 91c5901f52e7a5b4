// SPDX-License-Identifier: MIT OR Apache-2.0
//! Environment-knob configuration and the injectable [`Clock`] abstraction.
//!
//! Every validation and transition function elsewhere in the platform
//! substrate accepts a caller-supplied `now: DateTime<Utc>` rather than
//! reading the system clock directly, so tests can drive time deterministically.
//! [`Clock`] is the construction-time knob components use to obtain `now`
//! when the caller doesn't supply one explicitly.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current time. Real services use [`SystemClock`]; tests use
/// [`FixedClock`] to pin `now` or advance it deterministically.
pub trait Clock: Send + Sync {
    /// The current instant, per this clock.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// [`Clock`] that returns a caller-controlled instant.
///
/// # Examples
///
/// ```
/// use chartly_config::{Clock, FixedClock};
/// use chrono::{TimeZone, Utc};
///
/// let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let clock = FixedClock::new(t0);
/// assert_eq!(clock.now(), t0);
///
/// clock.advance(chrono::Duration::seconds(5));
/// assert_eq!(clock.now(), t0 + chrono::Duration::seconds(5));
/// ```
#[derive(Debug)]
pub struct FixedClock {
    micros_since_epoch: AtomicI64,
}

impl FixedClock {
    /// Create a clock pinned at `t`.
    #[must_use]
    pub fn new(t: DateTime<Utc>) -> Self {
        Self {
            micros_since_epoch: AtomicI64::new(
                t.timestamp() * 1_000_000 + i64::from(t.timestamp_subsec_micros()),
            ),
        }
    }

    /// Move the clock forward by `delta` (may be negative to move it back).
    pub fn advance(&self, delta: chrono::Duration) {
        self.micros_since_epoch
            .fetch_add(delta.num_microseconds().unwrap_or(0), Ordering::SeqCst);
    }

    /// Pin the clock to an exact instant.
    pub fn set(&self, t: DateTime<Utc>) {
        self.micros_since_epoch.store(
            t.timestamp() * 1_000_000 + i64::from(t.timestamp_subsec_micros()),
            Ordering::SeqCst,
        );
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.micros_since_epoch.load(Ordering::SeqCst);
        DateTime::from_timestamp(micros / 1_000_000, ((micros % 1_000_000) * 1_000) as u32)
            .unwrap_or_else(Utc::now)
    }
}

// ---------------------------------------------------------------------------
// Errors & warnings
// ---------------------------------------------------------------------------

/// Errors that can occur loading a [`ChartlyConfig`] from the environment.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value that failed to parse.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        /// Name of the environment variable.
        var: String,
        /// Human-readable parse failure detail.
        reason: String,
    },
    /// Semantic validation failed after parsing.
    #[error("config validation failed: {reasons:?}")]
    ValidationFailed {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// An environment variable was not set; the default was used.
    UsingDefault {
        /// Name of the environment variable.
        var: String,
        /// The default value substituted.
        default: String,
    },
    /// A configured value is valid but unusually large or small.
    UnusualValue {
        /// Name of the environment variable.
        var: String,
        /// Description of why the value is unusual.
        hint: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UsingDefault { var, default } => {
                write!(f, "{var} not set, using default {default}")
            }
            Self::UnusualValue { var, hint } => write!(f, "{var}: {hint}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ChartlyConfig
// ---------------------------------------------------------------------------

/// Server tunables named by the platform spec's "Environment knobs" section.
///
/// Field names drop the `*_` service prefix the spec uses for illustration
/// (e.g. `ORCH_MAX_BODY_BYTES`, `LEDGER_MAX_BODY_BYTES`) since this crate is
/// shared by every service; callers prefix [`ChartlyConfig::from_env`]'s
/// `prefix` argument instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartlyConfig {
    /// Maximum accepted request body size, in bytes.
    pub max_body_bytes: u64,
    /// Maximum accepted total header size, in bytes.
    pub max_header_bytes: u64,
    /// Read timeout, in milliseconds.
    pub read_timeout_ms: u64,
    /// Write timeout, in milliseconds.
    pub write_timeout_ms: u64,
    /// Idle connection timeout, in milliseconds.
    pub idle_timeout_ms: u64,
    /// Graceful shutdown grace period, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Override for the leader-election owner identity (`ORCH_NODE_ID`).
    pub node_id: Option<String>,
}

impl Default for ChartlyConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 4 * 1024 * 1024,
            max_header_bytes: 16 * 1024,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
            idle_timeout_ms: 120_000,
            shutdown_timeout_ms: 10_000,
            node_id: None,
        }
    }
}

impl ChartlyConfig {
    /// Load configuration from environment variables named `<prefix>_*`,
    /// falling back to [`ChartlyConfig::default`] for anything unset.
    ///
    /// Returns advisory [`ConfigWarning`]s for every field that fell back to
    /// its default, alongside the resolved config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a set environment variable
    /// fails to parse, or [`ConfigError::ValidationFailed`] if the resolved
    /// values violate semantic constraints (e.g. a zero timeout).
    pub fn from_env(prefix: &str) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let mut cfg = Self::default();
        let mut warnings = Vec::new();

        Self::load_u64(
            prefix,
            "MAX_BODY_BYTES",
            cfg.max_body_bytes,
            &mut cfg.max_body_bytes,
            &mut warnings,
        )?;
        Self::load_u64(
            prefix,
            "MAX_HEADER_BYTES",
            cfg.max_header_bytes,
            &mut cfg.max_header_bytes,
            &mut warnings,
        )?;
        Self::load_u64(
            prefix,
            "READ_TIMEOUT_MS",
            cfg.read_timeout_ms,
            &mut cfg.read_timeout_ms,
            &mut warnings,
        )?;
        Self::load_u64(
            prefix,
            "WRITE_TIMEOUT_MS",
            cfg.write_timeout_ms,
            &mut cfg.write_timeout_ms,
            &mut warnings,
        )?;
        Self::load_u64(
            prefix,
            "IDLE_TIMEOUT_MS",
            cfg.idle_timeout_ms,
            &mut cfg.idle_timeout_ms,
            &mut warnings,
        )?;
        Self::load_u64(
            prefix,
            "SHUTDOWN_TIMEOUT_MS",
            cfg.shutdown_timeout_ms,
            &mut cfg.shutdown_timeout_ms,
            &mut warnings,
        )?;

        if let Ok(node_id) = std::env::var("ORCH_NODE_ID") {
            if !node_id.trim().is_empty() {
                cfg.node_id = Some(node_id);
            }
        }

        cfg.validate()?;
        Ok((cfg, warnings))
    }

    fn load_u64(
        prefix: &str,
        suffix: &str,
        default: u64,
        out: &mut u64,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<(), ConfigError> {
        let var = format!("{prefix}_{suffix}");
        match std::env::var(&var) {
            Ok(raw) => {
                let parsed: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    var: var.clone(),
                    reason: format!("expected a non-negative integer, got {raw:?}"),
                })?;
                *out = parsed;
            }
            Err(_) => {
                warnings.push(ConfigWarning::UsingDefault {
                    var,
                    default: default.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate semantic constraints beyond parsing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationFailed`] if any timeout or body limit
    /// is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut reasons = Vec::new();
        if self.max_body_bytes == 0 {
            reasons.push("max_body_bytes must be > 0".to_string());
        }
        if self.max_header_bytes == 0 {
            reasons.push("max_header_bytes must be > 0".to_string());
        }
        for (name, v) in [
            ("read_timeout_ms", self.read_timeout_ms),
            ("write_timeout_ms", self.write_timeout_ms),
            ("idle_timeout_ms", self.idle_timeout_ms),
            ("shutdown_timeout_ms", self.shutdown_timeout_ms),
        ] {
            if v == 0 {
                reasons.push(format!("{name} must be > 0"));
            }
        }
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { reasons })
        }
    }
}
