// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable wire codes for Chartly platform services.
//!
//! Every Chartly error carries an [`ErrorCode`] (a machine-readable, stable
//! dotted tag such as `"queue.timeout"`), a fixed HTTP status, a `retryable`
//! flag, and an [`ErrorKind`]. Use [`ChartlyError::new`] to build one, then
//! attach structured context with [`ChartlyError::with_context`].
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Broad family an [`ErrorCode`] belongs to, per the platform's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller sent something invalid; not retryable.
    Client,
    /// Internal failure; safe to retry with backoff.
    Server,
    /// Authentication/authorization/tenancy violation; not retryable.
    Security,
    /// An external collaborator is unavailable or slow; retryable.
    Dependency,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Client => "client",
            Self::Server => "server",
            Self::Security => "security",
            Self::Dependency => "dependency",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serializes to the dotted wire string named in the platform's
/// error taxonomy (e.g. `"auth.unauthorized"`) and that string is guaranteed
/// not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ErrorCode {
    /// Caller presented no credentials at all.
    AuthUnauthorized,
    /// Caller is authenticated but lacks permission.
    AuthForbidden,
    /// Caller's token failed validation.
    AuthTokenInvalid,
    /// Caller's token is well-formed but expired.
    AuthTokenExpired,
    /// Request did not carry a tenant identifier.
    TenancyMissing,
    /// Tenant identifier failed validation.
    TenancyInvalid,
    /// Caller's tenant does not match the resource's tenant.
    TenancyForbidden,
    /// Payload failed contract/schema validation.
    ContractsInvalid,
    /// A profile document failed validation.
    ProfilesInvalid,
    /// A referenced profile does not exist.
    ProfilesNotFound,
    /// Configuration value failed validation.
    ConfigInvalid,
    /// Queue had no message available within the poll window.
    QueueEmpty,
    /// Queue backend has been closed.
    QueueClosed,
    /// Queue operation exceeded its deadline.
    QueueTimeout,
    /// Message payload exceeds the queue's configured limit.
    QueueOversize,
    /// Queue operation conflicted with concurrent state (e.g. stale receipt).
    QueueConflict,
    /// Referenced storage record does not exist.
    StorageNotFound,
    /// Storage write conflicted with existing state.
    StorageConflict,
    /// Stored value exceeds configured size limit.
    StorageOversize,
    /// Storage backend is unreachable or unhealthy.
    StorageUnavailable,
    /// Caller exceeded its configured rate limit.
    RateLimitExceeded,
    /// Audit record was rejected by the append store.
    AuditRejected,
    /// Audit record failed structural validation.
    AuditInvalid,
    /// Unexpected internal failure.
    Internal,
    /// Internal operation exceeded its deadline.
    InternalTimeout,
    /// A required external dependency is down.
    DependencyDown,
}

impl ErrorCode {
    /// Stable dotted wire string (e.g. `"auth.unauthorized"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthUnauthorized => "auth.unauthorized",
            Self::AuthForbidden => "auth.forbidden",
            Self::AuthTokenInvalid => "auth.token_invalid",
            Self::AuthTokenExpired => "auth.token_expired",
            Self::TenancyMissing => "tenancy.missing",
            Self::TenancyInvalid => "tenancy.invalid",
            Self::TenancyForbidden => "tenancy.forbidden",
            Self::ContractsInvalid => "contracts.invalid",
            Self::ProfilesInvalid => "profiles.invalid",
            Self::ProfilesNotFound => "profiles.not_found",
            Self::ConfigInvalid => "config.invalid",
            Self::QueueEmpty => "queue.empty",
            Self::QueueClosed => "queue.closed",
            Self::QueueTimeout => "queue.timeout",
            Self::QueueOversize => "queue.oversize",
            Self::QueueConflict => "queue.conflict",
            Self::StorageNotFound => "storage.not_found",
            Self::StorageConflict => "storage.conflict",
            Self::StorageOversize => "storage.oversize",
            Self::StorageUnavailable => "storage.unavailable",
            Self::RateLimitExceeded => "rate_limit.exceeded",
            Self::AuditRejected => "audit.rejected",
            Self::AuditInvalid => "audit.invalid",
            Self::Internal => "internal",
            Self::InternalTimeout => "internal.timeout",
            Self::DependencyDown => "dependency.down",
        }
    }

    /// Parse a dotted wire string back into an [`ErrorCode`].
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "auth.unauthorized" => Self::AuthUnauthorized,
            "auth.forbidden" => Self::AuthForbidden,
            "auth.token_invalid" => Self::AuthTokenInvalid,
            "auth.token_expired" => Self::AuthTokenExpired,
            "tenancy.missing" => Self::TenancyMissing,
            "tenancy.invalid" => Self::TenancyInvalid,
            "tenancy.forbidden" => Self::TenancyForbidden,
            "contracts.invalid" => Self::ContractsInvalid,
            "profiles.invalid" => Self::ProfilesInvalid,
            "profiles.not_found" => Self::ProfilesNotFound,
            "config.invalid" => Self::ConfigInvalid,
            "queue.empty" => Self::QueueEmpty,
            "queue.closed" => Self::QueueClosed,
            "queue.timeout" => Self::QueueTimeout,
            "queue.oversize" => Self::QueueOversize,
            "queue.conflict" => Self::QueueConflict,
            "storage.not_found" => Self::StorageNotFound,
            "storage.conflict" => Self::StorageConflict,
            "storage.oversize" => Self::StorageOversize,
            "storage.unavailable" => Self::StorageUnavailable,
            "rate_limit.exceeded" => Self::RateLimitExceeded,
            "audit.rejected" => Self::AuditRejected,
            "audit.invalid" => Self::AuditInvalid,
            "internal" => Self::Internal,
            "internal.timeout" => Self::InternalTimeout,
            "dependency.down" => Self::DependencyDown,
            _ => return None,
        })
    }

    /// Fixed HTTP status this code maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthUnauthorized => 401,
            Self::AuthForbidden | Self::AuthTokenExpired => 403,
            Self::AuthTokenInvalid => 401,
            Self::TenancyMissing | Self::TenancyInvalid => 400,
            Self::TenancyForbidden => 403,
            Self::ContractsInvalid | Self::ProfilesInvalid | Self::ConfigInvalid => 400,
            Self::ProfilesNotFound | Self::StorageNotFound => 404,
            Self::QueueEmpty => 204,
            Self::QueueClosed => 503,
            Self::QueueTimeout => 504,
            Self::QueueOversize | Self::StorageOversize => 413,
            Self::QueueConflict | Self::StorageConflict => 409,
            Self::StorageUnavailable | Self::DependencyDown => 503,
            Self::RateLimitExceeded => 429,
            Self::AuditRejected | Self::AuditInvalid => 400,
            Self::Internal => 500,
            Self::InternalTimeout => 504,
        }
    }

    /// Whether a caller should retry the operation that produced this code.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::QueueEmpty
                | Self::QueueClosed
                | Self::QueueTimeout
                | Self::StorageUnavailable
                | Self::DependencyDown
                | Self::Internal
                | Self::InternalTimeout
        )
    }

    /// Broad [`ErrorKind`] this code belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthUnauthorized
            | Self::AuthForbidden
            | Self::AuthTokenInvalid
            | Self::AuthTokenExpired
            | Self::TenancyMissing
            | Self::TenancyInvalid
            | Self::TenancyForbidden => ErrorKind::Security,

            Self::ContractsInvalid
            | Self::ProfilesInvalid
            | Self::ProfilesNotFound
            | Self::ConfigInvalid
            | Self::QueueOversize
            | Self::QueueConflict
            | Self::StorageOversize
            | Self::StorageConflict
            | Self::RateLimitExceeded
            | Self::AuditRejected
            | Self::AuditInvalid => ErrorKind::Client,

            Self::QueueEmpty | Self::QueueClosed | Self::QueueTimeout => ErrorKind::Dependency,
            Self::StorageNotFound => ErrorKind::Client,
            Self::StorageUnavailable | Self::DependencyDown => ErrorKind::Dependency,

            Self::Internal | Self::InternalTimeout => ErrorKind::Server,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown error code: {value}"))
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// ChartlyError
// ---------------------------------------------------------------------------

/// Unified Chartly error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// underlying cause for error-chaining, and arbitrary structured context.
///
/// # Examples
///
/// ```
/// use chartly_error::{ChartlyError, ErrorCode};
///
/// let err = ChartlyError::new(ErrorCode::QueueTimeout, "dequeue exceeded 30s")
///     .with_context("queue", "ingest")
///     .with_context("poll_timeout_ms", 30_000);
/// assert!(err.code.retryable());
/// ```
pub struct ChartlyError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description, sanitized per [`sanitize_message`].
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured diagnostic context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// Correlation identifier for the originating request, if known.
    pub request_id: Option<String>,
}

impl ChartlyError {
    /// Create a new error with the given code and message.
    ///
    /// The message is sanitized via [`sanitize_message`] before storage.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: sanitize_message(&message.into()),
            source: None,
            context: BTreeMap::new(),
            request_id: None,
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialization
    /// fails the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach a request correlation id.
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.retryable()`.
    pub fn retryable(&self) -> bool {
        self.code.retryable()
    }

    /// Shorthand for `self.code.kind()`.
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Render the `{error: {...}}` user-visible envelope described in the
    /// platform's error-handling design.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: self.message.clone(),
                retryable: self.retryable(),
                kind: self.kind(),
                request_id: self.request_id.clone(),
                trace_id: None,
                details: Vec::new(),
            },
        }
    }
}

impl fmt::Debug for ChartlyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ChartlyError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ChartlyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // BTreeMap gives deterministic key order.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ChartlyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Strip NUL and other control characters and bound length, per the
/// platform's user-visible-failure sanitization rule.
pub fn sanitize_message(message: &str) -> String {
    const MAX_LEN: usize = 2048;
    let cleaned: String = message
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect();
    if cleaned.chars().count() > MAX_LEN {
        cleaned.chars().take(MAX_LEN).collect()
    } else {
        cleaned
    }
}

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

/// Body of the user-visible `{error: {...}}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    /// Stable wire error code.
    pub code: ErrorCode,
    /// Sanitized human-readable message.
    pub message: String,
    /// Whether the caller may retry.
    pub retryable: bool,
    /// Broad error family.
    pub kind: ErrorKind,
    /// Correlation id for the originating request, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Distributed trace id, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Additional structured detail entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<serde_json::Value>,
}

/// Top-level user-visible failure envelope: `{"error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    /// The error body.
    pub error: ErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CODES: &[ErrorCode] = &[
        ErrorCode::AuthUnauthorized,
        ErrorCode::AuthForbidden,
        ErrorCode::AuthTokenInvalid,
        ErrorCode::AuthTokenExpired,
        ErrorCode::TenancyMissing,
        ErrorCode::TenancyInvalid,
        ErrorCode::TenancyForbidden,
        ErrorCode::ContractsInvalid,
        ErrorCode::ProfilesInvalid,
        ErrorCode::ProfilesNotFound,
        ErrorCode::ConfigInvalid,
        ErrorCode::QueueEmpty,
        ErrorCode::QueueClosed,
        ErrorCode::QueueTimeout,
        ErrorCode::QueueOversize,
        ErrorCode::QueueConflict,
        ErrorCode::StorageNotFound,
        ErrorCode::StorageConflict,
        ErrorCode::StorageOversize,
        ErrorCode::StorageUnavailable,
        ErrorCode::RateLimitExceeded,
        ErrorCode::AuditRejected,
        ErrorCode::AuditInvalid,
        ErrorCode::Internal,
        ErrorCode::InternalTimeout,
        ErrorCode::DependencyDown,
    ];

    #[test]
    fn every_code_round_trips_through_its_wire_string() {
        for code in ALL_CODES {
            let s = code.as_str();
            assert_eq!(ErrorCode::parse(s), Some(*code), "failed for {s}");
        }
    }

    #[test]
    fn every_code_has_a_stable_http_status() {
        for code in ALL_CODES {
            assert!(code.http_status() >= 200, "{code} has no status");
        }
    }

    #[test]
    fn queue_empty_is_retryable_and_terminal_codes_are_not() {
        assert!(ErrorCode::QueueEmpty.retryable());
        assert!(ErrorCode::DependencyDown.retryable());
        assert!(ErrorCode::Internal.retryable());
        assert!(!ErrorCode::ContractsInvalid.retryable());
        assert!(!ErrorCode::AuthForbidden.retryable());
        assert!(!ErrorCode::QueueOversize.retryable());
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = ChartlyError::new(ErrorCode::StorageNotFound, "no such record");
        assert_eq!(err.to_string(), "[storage.not_found] no such record");
    }

    #[test]
    fn display_includes_sorted_context() {
        let err = ChartlyError::new(ErrorCode::DependencyDown, "redis unreachable")
            .with_context("backend", "redis")
            .with_context("attempt", 3);
        let s = err.to_string();
        assert!(s.contains("\"attempt\":3"));
        assert!(s.contains("\"backend\":\"redis\""));
    }

    #[test]
    fn sanitize_strips_control_characters_and_bounds_length() {
        let dirty = format!("bad\0input\x07{}", "x".repeat(3000));
        let clean = sanitize_message(&dirty);
        assert!(!clean.contains('\0'));
        assert!(!clean.contains('\u{7}'));
        assert!(clean.chars().count() <= 2048);
    }

    #[test]
    fn envelope_serializes_with_stable_shape() {
        let err = ChartlyError::new(ErrorCode::RateLimitExceeded, "too many requests")
            .with_request_id("req-1");
        let env = err.to_envelope();
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["error"]["code"], "rate_limit.exceeded");
        assert_eq!(json["error"]["retryable"], false);
        assert_eq!(json["error"]["kind"], "client");
        assert_eq!(json["error"]["request_id"], "req-1");
    }

    #[test]
    fn source_chain_is_reachable_via_std_error() {
        let io_err = std::io::Error::other("boom");
        let err = ChartlyError::new(ErrorCode::Internal, "wrapped").with_source(io_err);
        assert!(std::error::Error::source(&err).is_some());
    }
}
