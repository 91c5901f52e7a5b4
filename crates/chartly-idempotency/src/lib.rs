// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic idempotency key construction.
//!
//! An [`IdempotencyKey`]'s external string form is
//! `v1:<tenant>:<scope>:<64-hex>`. The hash segment is the SHA-256 of the
//! canonical JSON encoding of the caller-supplied parts, so two calls with
//! the same tenant, scope, and logically-equal parts always produce the
//! identical key string ([`build_key`]).
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Key format version embedded in every external key string.
pub const KEY_VERSION: &str = "v1";
/// Maximum number of positional parts accepted by [`build_key`].
pub const MAX_PARTS: usize = 32;
/// Maximum size of the canonical-JSON-encoded parts, in bytes.
pub const MAX_ENCODED_BYTES: usize = 32 * 1024;
/// Maximum length of the tenant segment.
pub const MAX_TENANT_LEN: usize = 64;
/// Maximum length of the scope segment.
pub const MAX_SCOPE_LEN: usize = 32;
/// Maximum length of the full external key string.
pub const MAX_KEY_LEN: usize = 256;

/// Reasons [`build_key`] / [`parse_key`] fail, matching the platform's stable
/// failure-kind taxonomy for this layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdempotencyError {
    /// `tenant` is empty, too long, or contains a character outside
    /// `[a-z0-9_-]` once lowercased.
    #[error("invalid_scope: tenant {0:?} is not a valid tenant segment")]
    InvalidTenant(String),
    /// `scope` is empty, too long, or contains a character outside
    /// `[a-z0-9_-]` once lowercased.
    #[error("invalid_scope: scope {0:?} is not a valid scope segment")]
    InvalidScope(String),
    /// More than [`MAX_PARTS`] positional parts were supplied.
    #[error("input_too_big: {0} parts exceeds the {MAX_PARTS} part limit")]
    TooManyParts(usize),
    /// The canonical-JSON encoding of the parts exceeded [`MAX_ENCODED_BYTES`].
    #[error("input_too_big: encoded parts are {0} bytes, exceeding {MAX_ENCODED_BYTES}")]
    InputTooBig(usize),
    /// The parts could not be serialized at all.
    #[error("input_too_big: parts failed to serialize: {0}")]
    NotSerializable(String),
    /// A key string failed to parse: wrong segment count, wrong version, or a
    /// malformed hash segment.
    #[error("invalid_key: {0}")]
    InvalidKey(String),
}

/// A validated, deterministically-constructed idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    tenant: String,
    scope: String,
    hash: String,
}

impl IdempotencyKey {
    /// Lowercased tenant segment.
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Lowercased scope segment.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// 64-char lowercase hex hash segment.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{KEY_VERSION}:{}:{}:{}", self.tenant, self.scope, self.hash)
    }
}

/// Build a key from an ordered list of positional parts.
///
/// `tenant` and `scope` are lowercased and validated before use; `parts` are
/// canonically JSON-encoded (as a single array, preserving caller order) and
/// hashed with SHA-256.
///
/// # Errors
///
/// Returns [`IdempotencyError`] if `tenant`/`scope` are invalid, `parts`
/// exceeds [`MAX_PARTS`] entries, the canonical encoding exceeds
/// [`MAX_ENCODED_BYTES`], or a part cannot be serialized.
///
/// # Examples
///
/// ```
/// use chartly_idempotency::build_key;
/// use serde_json::json;
///
/// let key = build_key("TenantA", "ingest", &[json!({"k": "v"}), json!(7)]).unwrap();
/// assert_eq!(key.to_string(), build_key("tenanta", "ingest", &[json!({"k": "v"}), json!(7)]).unwrap().to_string());
/// assert!(key.to_string().starts_with("v1:tenanta:ingest:"));
/// ```
pub fn build_key<T: Serialize>(
    tenant: &str,
    scope: &str,
    parts: &[T],
) -> Result<IdempotencyKey, IdempotencyError> {
    let tenant = validate_tenant(tenant)?;
    let scope = validate_scope(scope)?;
    if parts.len() > MAX_PARTS {
        return Err(IdempotencyError::TooManyParts(parts.len()));
    }
    let encoded = chartly_canon::canonical_json_bytes(parts)
        .map_err(|e| IdempotencyError::NotSerializable(e.to_string()))?;
    if encoded.len() > MAX_ENCODED_BYTES {
        return Err(IdempotencyError::InputTooBig(encoded.len()));
    }
    let hash = chartly_canon::sha256_hex(&encoded);
    Ok(IdempotencyKey { tenant, scope, hash })
}

/// Build a key from a string-to-string map.
///
/// The map is flattened into a `[key, value, key, value, ...]` array in
/// sorted-key order (via `BTreeMap`'s iteration order) before delegating to
/// [`build_key`], so two maps with the same entries produce the same key
/// regardless of insertion order.
///
/// # Errors
///
/// Same as [`build_key`].
pub fn build_key_from_map(
    tenant: &str,
    scope: &str,
    parts: &BTreeMap<String, String>,
) -> Result<IdempotencyKey, IdempotencyError> {
    let flattened: Vec<&str> = parts
        .iter()
        .flat_map(|(k, v)| [k.as_str(), v.as_str()])
        .collect();
    build_key(tenant, scope, &flattened)
}

/// Parse an external key string of the form `v1:<tenant>:<scope>:<64-hex>`.
///
/// # Errors
///
/// Returns [`IdempotencyError::InvalidKey`] if the string does not have
/// exactly four colon-separated segments, the version segment is not `v1`,
/// the tenant/scope segments fail validation, or the hash segment is not 64
/// lowercase hex characters.
pub fn parse_key(s: &str) -> Result<IdempotencyKey, IdempotencyError> {
    if s.len() > MAX_KEY_LEN {
        return Err(IdempotencyError::InvalidKey(format!(
            "key exceeds {MAX_KEY_LEN} bytes"
        )));
    }
    let segments: Vec<&str> = s.split(':').collect();
    let [version, tenant, scope, hash] = segments.as_slice() else {
        return Err(IdempotencyError::InvalidKey(format!(
            "expected 4 colon-separated segments, got {}",
            segments.len()
        )));
    };
    if *version != KEY_VERSION {
        return Err(IdempotencyError::InvalidKey(format!(
            "unsupported key version {version:?}"
        )));
    }
    let tenant = validate_tenant(tenant).map_err(|_| {
        IdempotencyError::InvalidKey(format!("invalid tenant segment {tenant:?}"))
    })?;
    let scope = validate_scope(scope)
        .map_err(|_| IdempotencyError::InvalidKey(format!("invalid scope segment {scope:?}")))?;
    if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
        return Err(IdempotencyError::InvalidKey(
            "hash segment must be 64 lowercase hex characters".to_string(),
        ));
    }
    Ok(IdempotencyKey {
        tenant,
        scope,
        hash: (*hash).to_string(),
    })
}

fn validate_tenant(raw: &str) -> Result<String, IdempotencyError> {
    let lowered = raw.trim().to_ascii_lowercase();
    if lowered.is_empty() || lowered.len() > MAX_TENANT_LEN || !is_segment_charset(&lowered) {
        return Err(IdempotencyError::InvalidTenant(raw.to_string()));
    }
    Ok(lowered)
}

fn validate_scope(raw: &str) -> Result<String, IdempotencyError> {
    let lowered = raw.trim().to_ascii_lowercase();
    if lowered.is_empty() || lowered.len() > MAX_SCOPE_LEN || !is_segment_charset(&lowered) {
        return Err(IdempotencyError::InvalidScope(raw.to_string()));
    }
    Ok(lowered)
}

fn is_segment_charset(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}
