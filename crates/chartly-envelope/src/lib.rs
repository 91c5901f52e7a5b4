// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical message envelope and the queue backend capability contract.
//!
//! [`Envelope`] is the unit of work flowing through every Chartly queue.
//! This crate owns its shape, normalization, validation, and stable hash;
//! concrete queue backends (Redis streams, SQS, an in-memory mock for
//! tests) implement [`QueueBackend`] against it but are never depended on
//! here.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod hash;
mod validate;

pub use backend::{DequeueOutcome, QueueBackend, Receipt};
pub use hash::stable_envelope_hash;
pub use validate::EnvelopeError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default maximum payload size accepted by [`Envelope::normalize`]: 4 MiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 4 * 1024 * 1024;
/// Maximum number of header pairs retained by normalization.
pub const MAX_HEADER_PAIRS: usize = 64;
/// Maximum header key length, in bytes.
pub const MAX_HEADER_KEY_LEN: usize = 64;
/// Maximum header value length, in bytes; longer values are truncated.
pub const MAX_HEADER_VAL_LEN: usize = 256;
/// Maximum `type` length, in bytes.
pub const MAX_TYPE_LEN: usize = 128;
/// Maximum `id` length, in bytes.
pub const MAX_ID_LEN: usize = 128;
/// Maximum `dedup_key` length, in bytes.
pub const MAX_DEDUP_KEY_LEN: usize = 256;
/// Maximum `queue_name` length, in bytes.
pub const MAX_QUEUE_NAME_LEN: usize = 256;

/// The queue's unit of transport: metadata plus an opaque payload.
///
/// Construct with [`Envelope::new`], then call [`Envelope::normalize`]
/// before handing it to a [`QueueBackend`] — normalization is idempotent,
/// so it is safe to call more than once (e.g. once at the producer, again
/// when a consumer rehydrates the envelope from wire bytes).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    /// Name of the queue this envelope belongs to.
    pub queue_name: String,
    /// Opaque producer-assigned identifier.
    pub id: String,
    /// Required, non-empty message type discriminator.
    #[serde(rename = "type")]
    pub type_: String,
    /// Optional tenant routing tag.
    pub tenant: Option<String>,
    /// UTC timestamp the producer created this envelope.
    pub produced_at: DateTime<Utc>,
    /// Delivery attempt counter; 0 on first delivery.
    pub attempt: u32,
    /// Backend-owned lease expiry; `None` until the backend leases it.
    pub visibility_deadline: Option<DateTime<Utc>>,
    /// Optional producer-supplied deduplication key.
    pub dedup_key: Option<String>,
    /// Header key-value pairs; keys are lowercased by normalization.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Declared payload size in bytes.
    pub payload_bytes: u64,
    /// Opaque payload bytes.
    #[serde(default, with = "payload_as_base64")]
    pub payload: Option<Vec<u8>>,
}

impl Envelope {
    /// Construct a new envelope with the required fields; optional fields
    /// default to empty/absent. Call [`Envelope::normalize`] and
    /// [`Envelope::validate`] before enqueueing.
    pub fn new(
        queue_name: impl Into<String>,
        id: impl Into<String>,
        type_: impl Into<String>,
        produced_at: DateTime<Utc>,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            id: id.into(),
            type_: type_.into(),
            tenant: None,
            produced_at,
            attempt: 0,
            visibility_deadline: None,
            dedup_key: None,
            headers: BTreeMap::new(),
            payload_bytes: 0,
            payload: None,
        }
    }

    /// Attach a payload, setting `payload_bytes` to its length.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        let bytes = payload.into();
        self.payload_bytes = bytes.len() as u64;
        self.payload = Some(bytes);
        self
    }

    /// Set the tenant routing tag.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Set the dedup key.
    #[must_use]
    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    /// Insert a header pair (key will be lowercased by [`Envelope::normalize`]).
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Apply the platform's normalization rules in place: trim `type`,
    /// `tenant`, `dedup_key`; lowercase header keys; drop empty/oversized
    /// header keys; truncate oversized header values; cap the number of
    /// header pairs, keeping the lexicographically smallest keys.
    ///
    /// Idempotent: normalizing an already-normalized envelope is a no-op.
    pub fn normalize(&mut self) {
        self.type_ = chartly_canon::normalize(&self.type_);
        self.tenant = self
            .tenant
            .take()
            .map(|t| chartly_canon::normalize(&t))
            .filter(|t| !t.is_empty());
        self.dedup_key = self
            .dedup_key
            .take()
            .map(|d| chartly_canon::normalize(&d))
            .filter(|d| !d.is_empty());

        let mut normalized: BTreeMap<String, String> = BTreeMap::new();
        for (k, v) in std::mem::take(&mut self.headers) {
            let key = k.trim().to_ascii_lowercase();
            if key.is_empty() || key.len() > MAX_HEADER_KEY_LEN {
                continue;
            }
            let mut value = v;
            if value.len() > MAX_HEADER_VAL_LEN {
                value = value.chars().take(MAX_HEADER_VAL_LEN).collect();
            }
            normalized.insert(key, value);
        }
        if normalized.len() > MAX_HEADER_PAIRS {
            normalized = normalized
                .into_iter()
                .take(MAX_HEADER_PAIRS)
                .collect();
        }
        self.headers = normalized;
    }

    /// Validate envelope invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] describing the first violation found:
    /// empty/oversize `type`, negative/overflowing `attempt`, a
    /// `payload_bytes`/payload length mismatch, or an oversize payload.
    pub fn validate(&self, max_payload_bytes: u64) -> Result<(), EnvelopeError> {
        validate::validate(self, max_payload_bytes)
    }

    /// Compute the stable SHA-256 hash of this envelope.
    ///
    /// Equal after normalization regardless of header insertion order
    /// (see [`stable_envelope_hash`]).
    #[must_use]
    pub fn stable_hash(&self) -> String {
        stable_envelope_hash(self)
    }
}

mod payload_as_base64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_str(&chartly_canon::bytes_to_hex(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let opt: Option<String> = Option::deserialize(d)?;
        match opt {
            Some(hex_str) => {
                let bytes = hex::decode(&hex_str).map_err(serde::de::Error::custom)?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn new_envelope_has_zero_attempt_and_no_payload() {
        let e = Envelope::new("ingest", "id-1", "job", t0());
        assert_eq!(e.attempt, 0);
        assert_eq!(e.payload_bytes, 0);
        assert!(e.payload.is_none());
    }

    #[test]
    fn with_payload_sets_declared_size() {
        let e = Envelope::new("ingest", "id-1", "job", t0()).with_payload(b"hi".to_vec());
        assert_eq!(e.payload_bytes, 2);
        assert_eq!(e.payload.as_deref(), Some(b"hi".as_slice()));
    }

    #[test]
    fn normalize_lowercases_and_dedups_header_keys() {
        let mut e = Envelope::new("ingest", "id-1", "job", t0())
            .with_header("X-A", "1")
            .with_header("x-a", "2");
        e.normalize();
        assert_eq!(e.headers.len(), 1);
        assert_eq!(e.headers.get("x-a"), Some(&"2".to_string()));
    }

    #[test]
    fn normalize_trims_type_tenant_dedup_key() {
        let mut e = Envelope::new("ingest", "id-1", "  job  ", t0())
            .with_tenant("  t  ")
            .with_dedup_key("  d  ");
        e.normalize();
        assert_eq!(e.type_, "job");
        assert_eq!(e.tenant.as_deref(), Some("t"));
        assert_eq!(e.dedup_key.as_deref(), Some("d"));
    }

    #[test]
    fn normalize_drops_empty_and_oversized_header_keys() {
        let long_key = "k".repeat(MAX_HEADER_KEY_LEN + 1);
        let mut e = Envelope::new("ingest", "id-1", "job", t0())
            .with_header("", "x")
            .with_header(long_key, "y")
            .with_header("ok", "z");
        e.normalize();
        assert_eq!(e.headers.len(), 1);
        assert_eq!(e.headers.get("ok"), Some(&"z".to_string()));
    }

    #[test]
    fn normalize_truncates_oversized_header_values() {
        let mut e = Envelope::new("ingest", "id-1", "job", t0())
            .with_header("k", "v".repeat(MAX_HEADER_VAL_LEN + 10));
        e.normalize();
        assert_eq!(e.headers.get("k").unwrap().len(), MAX_HEADER_VAL_LEN);
    }

    #[test]
    fn normalize_caps_header_pairs_keeping_smallest_keys() {
        let mut e = Envelope::new("ingest", "id-1", "job", t0());
        for i in 0..(MAX_HEADER_PAIRS + 10) {
            e = e.with_header(format!("k{i:03}"), "v");
        }
        e.normalize();
        assert_eq!(e.headers.len(), MAX_HEADER_PAIRS);
        assert!(e.headers.contains_key("k000"));
        assert!(!e.headers.contains_key(&format!("k{:03}", MAX_HEADER_PAIRS + 5)));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut e = Envelope::new("ingest", "id-1", "  job  ", t0())
            .with_header("X-A", "1");
        e.normalize();
        let once = e.clone();
        e.normalize();
        assert_eq!(once, e);
    }
}
