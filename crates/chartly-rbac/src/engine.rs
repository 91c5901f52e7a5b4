// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::permission::{match_permission, parse_permission};
use crate::role::{Assignment, Role};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Outcome of [`RbacEngine::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the requested permission is granted.
    pub allowed: bool,
    /// Why the decision went the way it did. `None` on a plain, unqualified
    /// grant; `Some("invalid_principal")`, `Some("policy_expired")`, or
    /// `Some("no_matching_grant")` otherwise.
    pub reason: Option<String>,
    /// The specific grant string that matched, if any.
    pub matched_grant: Option<String>,
    /// Roles reachable from the assignment's `role_ids` via `inherits`,
    /// sorted and deduplicated.
    pub effective_roles: Vec<String>,
    /// The union of all valid permission grants held by `effective_roles`,
    /// sorted and deduplicated.
    pub effective_perms: Vec<String>,
}

impl Decision {
    fn deny(reason: &str, effective_roles: Vec<String>, effective_perms: Vec<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            matched_grant: None,
            effective_roles,
            effective_perms,
        }
    }
}

/// A compiled set of roles evaluated against assignments.
///
/// Construction normalizes every role: a role whose `id` is empty takes the
/// identifier it was registered under, and permission grants that fail
/// [`parse_permission`] are dropped rather than rejected.
#[derive(Debug, Clone)]
pub struct RbacEngine {
    roles: BTreeMap<String, Role>,
}

impl RbacEngine {
    /// Build an engine from a map of role id to [`Role`].
    #[must_use]
    pub fn new(roles: BTreeMap<String, Role>) -> Self {
        let normalized = roles
            .into_iter()
            .map(|(key, mut role)| {
                if role.id.is_empty() {
                    role.id = key.clone();
                }
                role.permissions = role
                    .permissions
                    .iter()
                    .filter_map(|p| parse_permission(p))
                    .collect();
                (key, role)
            })
            .collect();
        Self { roles: normalized }
    }

    /// Resolve `role_ids` and their transitive `inherits` closure into a
    /// sorted, deduplicated list of role ids and the sorted, deduplicated
    /// union of their permission grants.
    #[must_use]
    pub fn compile(&self, assignment: &Assignment) -> (Vec<String>, Vec<String>) {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = assignment.role_ids.iter().cloned().collect();
        let mut perms: BTreeSet<String> = BTreeSet::new();

        while let Some(role_id) = queue.pop_front() {
            if !seen.insert(role_id.clone()) {
                continue;
            }
            let Some(role) = self.roles.get(&role_id) else {
                continue;
            };
            for perm in &role.permissions {
                perms.insert(perm.clone());
            }
            for parent in &role.inherits {
                if !seen.contains(parent) {
                    queue.push_back(parent.clone());
                }
            }
        }

        (seen.into_iter().collect(), perms.into_iter().collect())
    }

    /// Decide whether `assignment` grants `want` at time `now`.
    ///
    /// The assignment's principal is validated first: an empty
    /// `principal.id` denies with `"invalid_principal"` before any
    /// time-bound check runs.
    ///
    /// Both `now < assignment.issued_at` and an expired assignment
    /// (`assignment.expires_at` is set and `now >= expires_at`) are reported
    /// with the identical reason `"policy_expired"` — the engine does not
    /// distinguish not-yet-effective from expired.
    ///
    /// Otherwise the engine scans `effective_perms` in sorted order and
    /// returns the first grant for which [`match_permission`] holds.
    #[must_use]
    pub fn decide(&self, assignment: &Assignment, want: &str, now: DateTime<Utc>) -> Decision {
        let (effective_roles, effective_perms) = self.compile(assignment);

        if assignment.principal.id.trim().is_empty() {
            return Decision::deny("invalid_principal", effective_roles, effective_perms);
        }

        if now < assignment.issued_at {
            return Decision::deny("policy_expired", effective_roles, effective_perms);
        }
        if let Some(expires_at) = assignment.expires_at {
            if now >= expires_at {
                return Decision::deny("policy_expired", effective_roles, effective_perms);
            }
        }

        match effective_perms.iter().find(|grant| match_permission(grant, want)) {
            Some(grant) => Decision {
                allowed: true,
                reason: None,
                matched_grant: Some(grant.clone()),
                effective_roles,
                effective_perms,
            },
            None => Decision::deny("no_matching_grant", effective_roles, effective_perms),
        }
    }
}
