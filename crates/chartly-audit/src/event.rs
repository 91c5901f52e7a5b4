// SPDX-License-Identifier: MIT OR Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record cannot be hashed or chained because a required field is missing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// `tenant_id` was empty.
    #[error("tenant_id must not be empty")]
    MissingTenantId,
    /// `event_id` was empty.
    #[error("event_id must not be empty")]
    MissingEventId,
    /// `action` was empty after normalization.
    #[error("action must not be empty")]
    MissingAction,
    /// `outcome` was empty after normalization.
    #[error("outcome must not be empty")]
    MissingOutcome,
    /// The event could not be serialized to canonical JSON.
    #[error("failed to canonicalize event: {0}")]
    Serialize(String),
}

/// A single audit event: who did what, to what, with what outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalEvent {
    /// Tenant this event belongs to.
    pub tenant_id: String,
    /// Caller-assigned opaque event identifier, unique per tenant.
    pub event_id: String,
    /// UTC timestamp of the event.
    pub ts: DateTime<Utc>,
    /// What happened (e.g. `"case.transition"`).
    pub action: String,
    /// The result (e.g. `"ok"`, `"denied"`).
    pub outcome: String,
    /// Optional reference to the object acted upon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    /// Optional request correlation id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Optional identifier of the principal that performed the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    /// Optional originating system/component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Bounded string tags.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// Free-form structured detail.
    #[serde(default)]
    pub detail: BTreeMap<String, serde_json::Value>,
}

impl CanonicalEvent {
    /// Construct a new event with its required fields.
    pub fn new(
        tenant_id: impl Into<String>,
        event_id: impl Into<String>,
        ts: DateTime<Utc>,
        action: impl Into<String>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            event_id: event_id.into(),
            ts,
            action: action.into(),
            outcome: outcome.into(),
            object_key: None,
            request_id: None,
            actor_id: None,
            source: None,
            meta: BTreeMap::new(),
            detail: BTreeMap::new(),
        }
    }

    /// Apply whitespace-collapse / NUL-strip normalization to every free-text
    /// field. Timestamps are already UTC by construction. Idempotent.
    pub fn normalize(&mut self) {
        self.tenant_id = chartly_canon::normalize(&self.tenant_id);
        self.event_id = chartly_canon::normalize(&self.event_id);
        self.action = chartly_canon::normalize(&self.action);
        self.outcome = chartly_canon::normalize(&self.outcome);
        self.object_key = self.object_key.take().map(|s| chartly_canon::normalize(&s));
        self.request_id = self.request_id.take().map(|s| chartly_canon::normalize(&s));
        self.actor_id = self.actor_id.take().map(|s| chartly_canon::normalize(&s));
        self.source = self.source.take().map(|s| chartly_canon::normalize(&s));
        self.meta = std::mem::take(&mut self.meta)
            .into_iter()
            .map(|(k, v)| (chartly_canon::normalize(&k), chartly_canon::normalize(&v)))
            .collect();
    }

    /// Validate required fields are present after normalization.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.tenant_id.is_empty() {
            return Err(EventError::MissingTenantId);
        }
        if self.event_id.is_empty() {
            return Err(EventError::MissingEventId);
        }
        if self.action.is_empty() {
            return Err(EventError::MissingAction);
        }
        if self.outcome.is_empty() {
            return Err(EventError::MissingOutcome);
        }
        Ok(())
    }

    /// Normalize a working copy, validate it, then emit canonical JSON bytes
    /// over that normalized, sorted-key structure. Used exclusively for
    /// hashing, so two events that normalize to the same structure always
    /// hash identically regardless of raw whitespace/NUL differences.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, EventError> {
        let mut normalized = self.clone();
        normalized.normalize();
        normalized.validate()?;
        chartly_canon::canonical_json_bytes(&normalized).map_err(|e| EventError::Serialize(e.to_string()))
    }
}
