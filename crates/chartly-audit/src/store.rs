// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::event::CanonicalEvent;
use chartly_error::{ChartlyError, ErrorCode};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Mutex;

/// Default `List` limit when the caller does not supply one.
pub const DEFAULT_LIST_LIMIT: usize = 200;
/// Maximum `List` limit regardless of what the caller requests.
pub const MAX_LIST_LIMIT: usize = 5000;

/// An event as held by the append store, stamped with arrival time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// The stored event.
    pub event: CanonicalEvent,
    /// When the store accepted the event, per the caller-supplied clock.
    pub received_at: DateTime<Utc>,
}

/// Append-only, tenant-scoped audit event storage.
///
/// Implementations MUST preserve ingestion order for [`AuditStore::list`]
/// and MUST treat a duplicate `(tenant_id, event_id)` [`AuditStore::put`] as
/// an idempotent no-op rather than an error.
pub trait AuditStore: Send + Sync {
    /// Validate and store `event`, stamping `received_at` with `now`.
    ///
    /// A duplicate `(tenant_id, event_id)` is silently accepted without
    /// creating a second entry.
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] with [`ErrorCode::AuditInvalid`] if
    /// `tenant_id` or `event_id` is empty.
    fn put(&self, event: CanonicalEvent, now: DateTime<Utc>) -> Result<(), ChartlyError>;

    /// List `tenant`'s events in ingestion order, optionally filtered to
    /// those with `ts` strictly after `since`, capped at `limit` (clamped to
    /// `[1, 5000]`, defaulting to 200).
    ///
    /// # Errors
    ///
    /// Returns [`ChartlyError`] on a backend failure. The in-memory
    /// implementation never fails.
    fn list(
        &self,
        tenant: &str,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<CanonicalEvent>, ChartlyError>;
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// A simple in-process [`AuditStore`], suitable for tests and for embedding
/// behind a durable backend that replays through the same contract.
#[derive(Default)]
pub struct InMemoryAuditStore {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    events: Vec<StoredEvent>,
    seen: HashSet<(String, String)>,
}

impl InMemoryAuditStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct events currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("audit store mutex poisoned").events.len()
    }

    /// Whether the store currently holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditStore for InMemoryAuditStore {
    fn put(&self, mut event: CanonicalEvent, now: DateTime<Utc>) -> Result<(), ChartlyError> {
        event.normalize();
        if event.tenant_id.is_empty() || event.event_id.is_empty() {
            return Err(ChartlyError::new(
                ErrorCode::AuditInvalid,
                "tenant_id and event_id are required",
            ));
        }
        let mut state = self.inner.lock().expect("audit store mutex poisoned");
        let key = (event.tenant_id.clone(), event.event_id.clone());
        if state.seen.contains(&key) {
            return Ok(());
        }
        state.seen.insert(key);
        state.events.push(StoredEvent { event, received_at: now });
        Ok(())
    }

    fn list(
        &self,
        tenant: &str,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<CanonicalEvent>, ChartlyError> {
        let limit = clamp_limit(limit);
        let state = self.inner.lock().expect("audit store mutex poisoned");
        let filtered = state
            .events
            .iter()
            .filter(|s| s.event.tenant_id == tenant)
            .filter(|s| match since {
                Some(cutoff) => s.event.ts > cutoff,
                None => true,
            })
            .take(limit)
            .map(|s| s.event.clone())
            .collect();
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn event(tenant: &str, id: &str, secs: i64) -> CanonicalEvent {
        CanonicalEvent::new(tenant, id, t(secs), "a", "ok")
    }

    #[test]
    fn put_is_idempotent_for_duplicate_event_ids() {
        let store = InMemoryAuditStore::new();
        store.put(event("t", "e1", 0), t(10)).unwrap();
        store.put(event("t", "e1", 0), t(11)).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_rejects_missing_required_fields() {
        let store = InMemoryAuditStore::new();
        let result = store.put(event("", "e1", 0), t(0));
        assert!(result.is_err());
    }

    #[test]
    fn list_preserves_ingestion_order_and_filters_by_tenant() {
        let store = InMemoryAuditStore::new();
        store.put(event("t", "e1", 0), t(0)).unwrap();
        store.put(event("other", "e2", 1), t(1)).unwrap();
        store.put(event("t", "e3", 2), t(2)).unwrap();

        let listed = store.list("t", None, None).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].event_id, "e1");
        assert_eq!(listed[1].event_id, "e3");
    }

    #[test]
    fn list_filters_by_since_exclusive() {
        let store = InMemoryAuditStore::new();
        store.put(event("t", "e1", 0), t(0)).unwrap();
        store.put(event("t", "e2", 10), t(10)).unwrap();

        let listed = store.list("t", Some(t(0)), None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].event_id, "e2");
    }

    #[test]
    fn list_clamps_limit_to_valid_range() {
        let store = InMemoryAuditStore::new();
        for i in 0..10 {
            store.put(event("t", &format!("e{i}"), i), t(i)).unwrap();
        }
        assert_eq!(store.list("t", None, Some(0)).unwrap().len(), 1);
        assert_eq!(store.list("t", None, Some(3)).unwrap().len(), 3);
    }
}
