// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hash-chained audit links, grounded in the same fold-with-prev-hash shape
//! as a receipt chain, but built once over a whole ordered event set rather
//! than incrementally pushed.

use crate::event::{CanonicalEvent, EventError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Literal `prev_hash` of the first link in any chain.
pub const GENESIS: &str = "GENESIS";

/// Failures building or verifying a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The input event set was empty.
    #[error("cannot build a chain from an empty event set")]
    EmptyEvents,
    /// An event's `tenant_id` did not match the chain's tenant.
    #[error("event {event_id} belongs to tenant {found}, expected {expected}")]
    TenantMismatch {
        /// Offending event id.
        event_id: String,
        /// Tenant found on the event.
        found: String,
        /// Tenant the chain was built for.
        expected: String,
    },
    /// Two events shared the same `(tenant_id, event_id)`.
    #[error("duplicate event_id {0} within tenant")]
    DuplicateEventId(String),
    /// An event failed its own field validation.
    #[error(transparent)]
    Event(#[from] EventError),
    /// `VerifyEvents` found a timestamp ordering violation under
    /// `require_monotonic`.
    #[error("event {event_id} is not monotonically ordered after the preceding event")]
    NonMonotonic {
        /// Offending event id.
        event_id: String,
    },
    /// A rebuilt chain did not match the stored chain at the given position.
    #[error("chain mismatch at link index {index}")]
    ChainMismatch {
        /// Index of the first mismatching link.
        index: usize,
    },
    /// A rebuilt chain's head did not match the stored chain's head.
    #[error("chain head mismatch")]
    HeadMismatch,
}

/// One link in a tenant's audit chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainLink {
    /// Tenant this link belongs to.
    pub tenant_id: String,
    /// The event this link was built from.
    pub event_id: String,
    /// Event timestamp, copied for convenient chain inspection.
    pub ts: DateTime<Utc>,
    /// Hash of the previous link, or [`GENESIS`] for the first link.
    pub prev_hash: String,
    /// `SHA256(prev_hash + "\n" + canonical_event_bytes)`.
    pub hash: String,
}

/// An ordered, tenant-scoped hash chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chain {
    /// Tenant this chain belongs to.
    pub tenant_id: String,
    /// Hash of the final link, or [`GENESIS`] if the chain has no links.
    pub head: String,
    /// Links in ascending `(ts, event_id)` order.
    pub links: Vec<ChainLink>,
}

/// Sort a copy of `events` by `(ts asc, event_id asc)`, the order every chain
/// operation in this module uses.
fn sorted_events(events: &[CanonicalEvent]) -> Vec<CanonicalEvent> {
    let mut copy: Vec<CanonicalEvent> = events.to_vec();
    copy.sort_by(|a, b| a.ts.cmp(&b.ts).then_with(|| a.event_id.cmp(&b.event_id)));
    copy
}

/// Build a hash chain for `tenant` over `events`.
///
/// Events are copied, sorted by `(ts, event_id)`, and folded with
/// `prev := "GENESIS"`; each link's hash covers the previous link's hash and
/// the event's own canonical bytes.
///
/// # Errors
///
/// Returns [`ChainError::EmptyEvents`] if `events` is empty,
/// [`ChainError::TenantMismatch`] if any event's `tenant_id` differs from
/// `tenant`, [`ChainError::DuplicateEventId`] on a repeated `event_id`, or
/// [`ChainError::Event`] if an event fails its own validation.
pub fn build_chain(tenant: &str, events: &[CanonicalEvent]) -> Result<Chain, ChainError> {
    if events.is_empty() {
        return Err(ChainError::EmptyEvents);
    }
    let sorted = sorted_events(events);
    let mut seen = HashSet::new();
    let mut prev = GENESIS.to_string();
    let mut links = Vec::with_capacity(sorted.len());

    for event in &sorted {
        if event.tenant_id != tenant {
            return Err(ChainError::TenantMismatch {
                event_id: event.event_id.clone(),
                found: event.tenant_id.clone(),
                expected: tenant.to_string(),
            });
        }
        if !seen.insert(event.event_id.clone()) {
            return Err(ChainError::DuplicateEventId(event.event_id.clone()));
        }
        let canonical = event.canonical_bytes()?;
        let mut preimage = Vec::with_capacity(prev.len() + 1 + canonical.len());
        preimage.extend_from_slice(prev.as_bytes());
        preimage.push(b'\n');
        preimage.extend_from_slice(&canonical);
        let hash = chartly_canon::sha256_hex(&preimage);

        links.push(ChainLink {
            tenant_id: tenant.to_string(),
            event_id: event.event_id.clone(),
            ts: event.ts,
            prev_hash: prev.clone(),
            hash: hash.clone(),
        });
        prev = hash;
    }

    Ok(Chain {
        tenant_id: tenant.to_string(),
        head: prev,
        links,
    })
}

/// Rebuild a chain from `events` and compare it position-wise (and by head)
/// against `chain`.
///
/// # Errors
///
/// Returns whatever [`build_chain`] would return on the same events, or
/// [`ChainError::ChainMismatch`] / [`ChainError::HeadMismatch`] if the
/// rebuilt chain differs from `chain`.
pub fn verify_chain(chain: &Chain, events: &[CanonicalEvent]) -> Result<(), ChainError> {
    let rebuilt = build_chain(&chain.tenant_id, events)?;
    if rebuilt.links.len() != chain.links.len() {
        return Err(ChainError::ChainMismatch { index: 0 });
    }
    for (i, (a, b)) in rebuilt.links.iter().zip(chain.links.iter()).enumerate() {
        if a != b {
            return Err(ChainError::ChainMismatch { index: i });
        }
    }
    if rebuilt.head != chain.head {
        return Err(ChainError::HeadMismatch);
    }
    Ok(())
}

/// Options controlling [`verify_events`].
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyOptions {
    /// Reject events whose `tenant_id` differs from the expected tenant.
    pub require_tenant: bool,
    /// Reject out-of-order timestamps after the deterministic sort.
    pub require_monotonic: bool,
}

/// Validate an event set independent of chain construction: non-empty, no
/// duplicate `(tenant_id, event_id)`, every `ts` present, and (optionally)
/// monotonically increasing after the `(ts, event_id)` sort.
///
/// # Errors
///
/// Returns [`ChainError::EmptyEvents`], [`ChainError::TenantMismatch`],
/// [`ChainError::DuplicateEventId`], [`ChainError::Event`], or
/// [`ChainError::NonMonotonic`].
pub fn verify_events(
    tenant: &str,
    events: &[CanonicalEvent],
    opts: VerifyOptions,
) -> Result<(), ChainError> {
    if events.is_empty() {
        return Err(ChainError::EmptyEvents);
    }
    let sorted = sorted_events(events);
    let mut seen = HashSet::new();
    let mut last_ts: Option<DateTime<Utc>> = None;

    for event in &sorted {
        event.validate()?;
        if opts.require_tenant && event.tenant_id != tenant {
            return Err(ChainError::TenantMismatch {
                event_id: event.event_id.clone(),
                found: event.tenant_id.clone(),
                expected: tenant.to_string(),
            });
        }
        if !seen.insert(event.event_id.clone()) {
            return Err(ChainError::DuplicateEventId(event.event_id.clone()));
        }
        if opts.require_monotonic {
            if let Some(prev_ts) = last_ts {
                if event.ts < prev_ts {
                    return Err(ChainError::NonMonotonic {
                        event_id: event.event_id.clone(),
                    });
                }
            }
        }
        last_ts = Some(event.ts);
    }
    Ok(())
}
