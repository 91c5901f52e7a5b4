// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::entity::EntityRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of [`Case::title`].
pub const MAX_TITLE_LEN: usize = 256;

/// Lifecycle state of a [`Case`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Newly created, not yet triaged.
    Open,
    /// Actively being worked.
    Investigate,
    /// Impact contained; investigation may resume.
    Mitigated,
    /// Investigation concluded successfully.
    Resolved,
    /// Determined not to require further action.
    Rejected,
    /// Terminal: no further transitions allowed.
    Closed,
}

impl CaseStatus {
    fn allowed_next(self) -> &'static [CaseStatus] {
        use CaseStatus::{Closed, Investigate, Mitigated, Rejected, Resolved};
        match self {
            Self::Open => &[Investigate, Rejected, Closed],
            Self::Investigate => &[Mitigated, Resolved, Rejected, Closed],
            Self::Mitigated => &[Investigate, Resolved, Closed],
            Self::Resolved => &[Closed],
            Self::Rejected => &[Closed],
            Self::Closed => &[],
        }
    }
}

/// Failures constructing, transitioning, or hashing a [`Case`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseError {
    /// `id` was empty.
    #[error("case id must not be empty")]
    MissingId,
    /// `tenant_id` was empty.
    #[error("case tenant_id must not be empty")]
    MissingTenantId,
    /// The requested transition is not reachable from the current status.
    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current status.
        from: CaseStatus,
        /// Requested status.
        to: CaseStatus,
    },
    /// The case could not be serialized to canonical JSON.
    #[error("failed to canonicalize case: {0}")]
    Serialize(String),
}

/// A tamper-evident case record with a validated lifecycle and a
/// self-referential hash chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Case {
    /// Opaque case identifier, unique per tenant.
    pub id: String,
    /// Tenant this case belongs to.
    pub tenant_id: String,
    /// What the case is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<EntityRef>,
    /// Short human-readable title.
    pub title: String,
    /// Current lifecycle status.
    pub status: CaseStatus,
    /// When the case first entered an active (non-`open`) status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened: Option<DateTime<Utc>>,
    /// When the case entered `closed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed: Option<DateTime<Utc>>,
    /// Timestamp of the most recent transition.
    pub updated: DateTime<Utc>,
    /// Hash of the previous case revision, or `"GENESIS"` for the first.
    pub prev_hash: String,
    /// Self-referential hash over every field except this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Case {
    /// Construct a new case in the `open` status.
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            subject: None,
            title: chartly_canon::normalize(&title.into()),
            status: CaseStatus::Open,
            opened: None,
            closed: None,
            updated: now,
            prev_hash: "GENESIS".to_string(),
            hash: None,
        }
    }

    /// Attach the entity this case concerns.
    #[must_use]
    pub fn with_subject(mut self, subject: EntityRef) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Attempt a lifecycle transition to `next` at time `now`.
    ///
    /// On first entry to `investigate` or `mitigated`, stamps `opened` if not
    /// already set. On entry to `closed`, stamps `closed` if not already set.
    /// Always stamps `updated` on success.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::InvalidTransition`] if `next` is not reachable
    /// from the current status.
    pub fn transition_status(&mut self, next: CaseStatus, now: DateTime<Utc>) -> Result<(), CaseError> {
        if !self.status.allowed_next().contains(&next) {
            return Err(CaseError::InvalidTransition { from: self.status, to: next });
        }
        if matches!(next, CaseStatus::Investigate | CaseStatus::Mitigated) && self.opened.is_none() {
            self.opened = Some(now);
        }
        if matches!(next, CaseStatus::Closed) && self.closed.is_none() {
            self.closed = Some(now);
        }
        self.status = next;
        self.updated = now;
        Ok(())
    }

    /// Apply normalization to free-text fields. Idempotent.
    pub fn normalize(&mut self) {
        self.id = chartly_canon::normalize(&self.id);
        self.tenant_id = chartly_canon::normalize(&self.tenant_id);
        self.title = chartly_canon::normalize(&self.title);
        if self.title.len() > MAX_TITLE_LEN {
            self.title = self.title.chars().take(MAX_TITLE_LEN).collect();
        }
    }

    /// Validate required fields.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::MissingId`] or [`CaseError::MissingTenantId`].
    pub fn validate(&self) -> Result<(), CaseError> {
        if self.id.is_empty() {
            return Err(CaseError::MissingId);
        }
        if self.tenant_id.is_empty() {
            return Err(CaseError::MissingTenantId);
        }
        Ok(())
    }

    /// Set `prev_hash`, blank `hash`, normalize, validate, recompute the
    /// hash over the canonical (hash-less) representation, and store it.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError`] if normalization leaves required fields empty,
    /// or if the case cannot be serialized.
    pub fn compute_hash(&mut self, prev_hash: impl Into<String>) -> Result<String, CaseError> {
        self.prev_hash = prev_hash.into();
        self.hash = None;
        self.normalize();
        self.validate()?;
        let hash = self.canonical_hash()?;
        self.hash = Some(hash.clone());
        Ok(hash)
    }

    /// Recompute the hash from the case's current fields and compare it
    /// against the stored [`Case::hash`].
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        match self.canonical_hash() {
            Ok(recomputed) => self.hash.as_deref() == Some(recomputed.as_str()),
            Err(_) => false,
        }
    }

    fn canonical_hash(&self) -> Result<String, CaseError> {
        let mut without_hash = self.clone();
        without_hash.hash = None;
        let bytes = chartly_canon::canonical_json_bytes(&without_hash)
            .map_err(|e| CaseError::Serialize(e.to_string()))?;
        Ok(chartly_canon::sha256_hex(&bytes))
    }
}
