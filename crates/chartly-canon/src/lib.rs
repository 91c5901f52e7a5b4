// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic canonicalization primitives: string normalization, canonical
//! JSON byte encoding, and SHA-256 / HMAC-SHA-256 hashing.
//!
//! Every hash computed anywhere else in the platform substrate — envelope
//! hashes, idempotency keys, audit chain links, case hashes — is built on
//! top of [`canonical_json_bytes`] and [`sha256_hex`] so that two logically
//! equal values always produce byte-identical output regardless of field
//! or map insertion order.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Errors produced while canonicalizing a value.
#[derive(Debug)]
pub enum CanonError {
    /// The value could not be serialized to JSON at all.
    Serialize(serde_json::Error),
}

impl fmt::Display for CanonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize(e) => write!(f, "failed to canonicalize value: {e}"),
        }
    }
}

impl std::error::Error for CanonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialize(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for CanonError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

/// Strip NUL bytes, trim leading/trailing whitespace, and collapse internal
/// whitespace runs to a single ASCII space.
///
/// Applied to every free-text field (`type`, `tenant`, `dedup_key`, audit
/// `action`/`outcome`, ...) before it participates in any hash or is stored.
///
/// # Examples
///
/// ```
/// use chartly_canon::normalize;
/// assert_eq!(normalize("  hello\u{0}   world  "), "hello world");
/// assert_eq!(normalize("a\t\nb"), "a b");
/// ```
#[must_use]
pub fn normalize(s: &str) -> String {
    let without_nul: String = s.chars().filter(|c| *c != '\0').collect();
    let mut out = String::with_capacity(without_nul.len());
    let mut in_ws = false;
    for c in without_nul.trim().chars() {
        if c.is_whitespace() {
            if !in_ws {
                out.push(' ');
                in_ws = true;
            }
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    out
}

/// Serialize `value` to its canonical JSON byte representation: object keys
/// sorted lexicographically at every depth, compact (no insignificant
/// whitespace), numbers in `serde_json`'s standard decimal form.
///
/// The value is first round-tripped through [`serde_json::Value`]: since
/// `serde_json`'s default (non-`preserve_order`) map representation is a
/// `BTreeMap`, this sorts every object's keys regardless of the original
/// struct field order or map insertion order, satisfying the byte-stability
/// contract required of every downstream hash.
///
/// # Errors
///
/// Returns [`CanonError`] if `value` cannot be serialized.
///
/// # Examples
///
/// ```
/// use chartly_canon::canonical_json_bytes;
/// use serde_json::json;
///
/// let a = json!({"b": 1, "a": 2});
/// let b = json!({"a": 2, "b": 1});
/// assert_eq!(canonical_json_bytes(&a).unwrap(), canonical_json_bytes(&b).unwrap());
/// ```
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonError> {
    let as_value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&as_value)?)
}

/// Convenience wrapper around [`canonical_json_bytes`] returning a `String`.
///
/// # Errors
///
/// Returns [`CanonError`] if `value` cannot be serialized.
pub fn canonical_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonError> {
    let bytes = canonical_json_bytes(value)?;
    // Canonical JSON bytes are always valid UTF-8.
    Ok(String::from_utf8(bytes).expect("canonical JSON is valid UTF-8"))
}

/// Encode raw bytes as a lowercase hex string, for use as the canonical JSON
/// representation of byte-string fields (per the canonicalization contract's
/// "byte strings as lowercase hex" rule).
#[must_use]
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Lowercase hex SHA-256 digest of `bytes`.
///
/// # Examples
///
/// ```
/// use chartly_canon::sha256_hex;
/// let h = sha256_hex(b"hello");
/// assert_eq!(h.len(), 64);
/// assert_eq!(h, sha256_hex(b"hello"));
/// ```
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Lowercase hex HMAC-SHA-256 of `bytes` keyed by `secret`.
///
/// # Panics
///
/// Never panics: HMAC accepts keys of any length.
///
/// # Examples
///
/// ```
/// use chartly_canon::hmac_sha256_hex;
/// let h = hmac_sha256_hex(b"secret", b"hello");
/// assert_eq!(h.len(), 64);
/// assert_eq!(h, hmac_sha256_hex(b"secret", b"hello"));
/// assert_ne!(h, hmac_sha256_hex(b"other", b"hello"));
/// ```
#[must_use]
pub fn hmac_sha256_hex(secret: &[u8], bytes: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(bytes);
    hex::encode(mac.finalize().into_bytes())
}
