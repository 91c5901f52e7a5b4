// SPDX-License-Identifier: MIT OR Apache-2.0
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reasons an [`EntityRef`] fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityRefError {
    /// `tenant` did not match `[a-z0-9][a-z0-9_-]{0,62}`.
    #[error("invalid tenant segment: {0:?}")]
    InvalidTenant(String),
    /// `kind` did not match `[a-z][a-z0-9._-]{0,63}`.
    #[error("invalid kind segment: {0:?}")]
    InvalidKind(String),
    /// `id` did not match `[A-Za-z0-9][A-Za-z0-9_-]{0,127}`.
    #[error("invalid id segment: {0:?}")]
    InvalidId(String),
    /// A parsed string did not have exactly three `/`-separated segments.
    #[error("expected <tenant>/<kind>/<id>, got {0:?}")]
    MalformedString(String),
}

/// A validated reference to a tenant-scoped entity: `<tenant>/<kind>/<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct EntityRef {
    tenant: String,
    kind: String,
    id: String,
}

impl EntityRef {
    /// Validate and construct an [`EntityRef`] from its three segments.
    ///
    /// # Errors
    ///
    /// Returns [`EntityRefError`] if any segment fails its charset/length
    /// rule.
    pub fn new(
        tenant: impl Into<String>,
        kind: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self, EntityRefError> {
        let tenant = tenant.into();
        let kind = kind.into();
        let id = id.into();
        validate_tenant(&tenant)?;
        validate_kind(&kind)?;
        validate_id(&id)?;
        Ok(Self { tenant, kind, id })
    }

    /// Tenant segment.
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Kind segment.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Id segment.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant, self.kind, self.id)
    }
}

impl From<EntityRef> for String {
    fn from(value: EntityRef) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for EntityRef {
    type Error = EntityRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut parts = value.splitn(3, '/');
        let (Some(tenant), Some(kind), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(EntityRefError::MalformedString(value));
        };
        if parts.next().is_some() {
            return Err(EntityRefError::MalformedString(value));
        }
        Self::new(tenant, kind, id)
    }
}

fn validate_tenant(s: &str) -> Result<(), EntityRefError> {
    let ok = matches!(s.as_bytes().first(), Some(b) if b.is_ascii_lowercase() || b.is_ascii_digit())
        && s.len() <= 63
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(EntityRefError::InvalidTenant(s.to_string()))
    }
}

fn validate_kind(s: &str) -> Result<(), EntityRefError> {
    let ok = matches!(s.as_bytes().first(), Some(b) if b.is_ascii_lowercase())
        && s.len() <= 64
        && s.bytes().all(|b| {
            b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'_' || b == b'-'
        });
    if ok {
        Ok(())
    } else {
        Err(EntityRefError::InvalidKind(s.to_string()))
    }
}

fn validate_id(s: &str) -> Result<(), EntityRefError> {
    let ok = matches!(s.as_bytes().first(), Some(b) if b.is_ascii_alphanumeric())
        && s.len() <= 128
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(EntityRefError::InvalidId(s.to_string()))
    }
}
