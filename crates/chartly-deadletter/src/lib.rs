// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dead-letter records: the terminal sink for envelopes that exhaust their
//! retry budget.
//!
//! A [`DeadLetterRecord`] is envelope-aware but independently hashable: its
//! [`DeadLetterRecord::stable_hash`] folds in the envelope's own
//! [`chartly_envelope::Envelope::stable_hash`] rather than the envelope's
//! full body, so a record stays byte-stable even when the envelope payload
//! is archived separately from the DLQ index.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use chartly_envelope::Envelope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum length of [`DeadLetterRecord::reason`], in bytes.
pub const MAX_REASON_LEN: usize = 512;
/// Maximum number of `extra` tag pairs retained by normalization.
pub const MAX_EXTRA_PAIRS: usize = 64;
/// Maximum `extra` tag key length, in bytes.
pub const MAX_EXTRA_KEY_LEN: usize = 64;
/// Maximum `extra` tag value length, in bytes.
pub const MAX_EXTRA_VAL_LEN: usize = 256;

/// A poison-message record: the envelope that failed, why, and when.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeadLetterRecord {
    /// Caller/store-assigned opaque identifier; excluded from the stable hash.
    pub record_id: String,
    /// The envelope that was dead-lettered, already normalized.
    pub envelope: Envelope,
    /// Delivery attempt count at the time of dead-lettering.
    pub final_attempt: u32,
    /// Human-readable reason, truncated to [`MAX_REASON_LEN`] bytes.
    pub reason: String,
    /// When this envelope (by id/dedup_key) was first seen by the DLQ store.
    pub first_seen_at: DateTime<Utc>,
    /// When this envelope was most recently seen by the DLQ store.
    pub last_seen_at: DateTime<Utc>,
    /// When the record was moved to the dead-letter lane.
    pub dead_lettered_at: DateTime<Utc>,
    /// Bounded operator-supplied tags.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    /// Stable hash, populated by [`DeadLetterRecord::compute_hash`]; excluded
    /// from the hash computation itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_hash: Option<String>,
}

impl DeadLetterRecord {
    /// Construct a new record. `record_id` should be assigned by the DLQ
    /// store (e.g. a UUID); this crate never generates one implicitly.
    pub fn new(
        record_id: impl Into<String>,
        envelope: Envelope,
        final_attempt: u32,
        reason: impl Into<String>,
        first_seen_at: DateTime<Utc>,
        last_seen_at: DateTime<Utc>,
        dead_lettered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            envelope,
            final_attempt,
            reason: reason.into(),
            first_seen_at,
            last_seen_at,
            dead_lettered_at,
            extra: BTreeMap::new(),
            record_hash: None,
        }
    }

    /// Attach an operator tag.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Apply normalization in place: normalize the envelope, truncate
    /// `reason`, and bound `extra` the same way envelope headers are bounded.
    ///
    /// Idempotent.
    pub fn normalize(&mut self) {
        self.envelope.normalize();

        self.reason = chartly_canon::normalize(&self.reason);
        if self.reason.len() > MAX_REASON_LEN {
            self.reason = self.reason.chars().take(MAX_REASON_LEN).collect();
        }

        let mut normalized = BTreeMap::new();
        for (k, v) in std::mem::take(&mut self.extra) {
            let key = chartly_canon::normalize(&k);
            if key.is_empty() || key.len() > MAX_EXTRA_KEY_LEN {
                continue;
            }
            let mut value = chartly_canon::normalize(&v);
            if value.len() > MAX_EXTRA_VAL_LEN {
                value = value.chars().take(MAX_EXTRA_VAL_LEN).collect();
            }
            normalized.insert(key, value);
        }
        if normalized.len() > MAX_EXTRA_PAIRS {
            normalized = normalized.into_iter().take(MAX_EXTRA_PAIRS).collect();
        }
        self.extra = normalized;
    }

    /// Compute and store the stable hash, excluding `record_id` and
    /// `record_hash` itself but including the envelope's own stable hash.
    pub fn compute_hash(&mut self) -> String {
        let hash = self.stable_hash();
        self.record_hash = Some(hash.clone());
        hash
    }

    /// Compute the stable hash without mutating `self`.
    #[must_use]
    pub fn stable_hash(&self) -> String {
        let mut buf = Vec::new();
        push_segment(&mut buf, self.envelope.stable_hash().as_bytes());
        push_segment(&mut buf, self.final_attempt.to_string().as_bytes());
        push_segment(&mut buf, self.reason.as_bytes());
        push_segment(&mut buf, self.first_seen_at.to_rfc3339().as_bytes());
        push_segment(&mut buf, self.last_seen_at.to_rfc3339().as_bytes());
        push_segment(&mut buf, self.dead_lettered_at.to_rfc3339().as_bytes());
        for (k, v) in &self.extra {
            push_segment(&mut buf, k.as_bytes());
            push_segment(&mut buf, v.as_bytes());
        }
        chartly_canon::sha256_hex(&buf)
    }

    /// Recompute the hash and compare it against the stored `record_hash`.
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        self.record_hash.as_deref() == Some(self.stable_hash().as_str())
    }
}

fn push_segment(buf: &mut Vec<u8>, segment: &[u8]) {
    buf.extend_from_slice(segment);
    buf.push(0);
}
