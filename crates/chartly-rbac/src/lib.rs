// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hierarchical permission RBAC: roles inherit from other roles, principals
//! hold time-bounded assignments of roles, and decisions are a deterministic
//! first-match scan over the assignment's effective permission set.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod permission;
mod role;

pub use engine::{Decision, RbacEngine};
pub use permission::{match_permission, parse_permission};
pub use role::{Assignment, Principal, Role};
