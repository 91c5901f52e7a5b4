// SPDX-License-Identifier: MIT OR Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named bundle of permission grants, optionally inheriting from other
/// roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Unique role identifier within a tenant's policy.
    #[serde(default)]
    pub id: String,
    /// Other role ids this role transitively inherits permissions from.
    #[serde(default)]
    pub inherits: Vec<String>,
    /// Permission grants this role holds directly (before inheritance).
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Role {
    /// Construct a role with no inheritance and no permissions.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), inherits: Vec::new(), permissions: Vec::new() }
    }

    /// Attach a grant.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// Attach an inherited role id.
    #[must_use]
    pub fn with_inherits(mut self, role_id: impl Into<String>) -> Self {
        self.inherits.push(role_id.into());
        self
    }
}

/// The actor a [`Assignment`] grants roles to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque principal identifier (user id, service account id, ...).
    pub id: String,
    /// Principal category, e.g. `"user"` or `"service"`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Principal {
    /// Construct a principal.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { id: id.into(), kind: kind.into() }
    }
}

/// A time-bounded grant of roles to a principal within a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Tenant this assignment is scoped to.
    pub tenant_id: String,
    /// Who the roles are assigned to.
    pub principal: Principal,
    /// Role ids directly assigned; inheritance is resolved separately.
    pub role_ids: Vec<String>,
    /// When the assignment becomes effective.
    pub issued_at: DateTime<Utc>,
    /// When the assignment stops being effective, if bounded.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form metadata, not interpreted by the engine.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl Assignment {
    /// Construct an assignment effective immediately with no expiry.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        principal: Principal,
        role_ids: Vec<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            principal,
            role_ids,
            issued_at,
            expires_at: None,
            meta: BTreeMap::new(),
        }
    }

    /// Bound the assignment's effective window.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_builders_accumulate_in_call_order() {
        let role = Role::new("analyst")
            .with_permission("reports.*.read")
            .with_inherits("viewer");
        assert_eq!(role.permissions, vec!["reports.*.read".to_string()]);
        assert_eq!(role.inherits, vec!["viewer".to_string()]);
    }
}
