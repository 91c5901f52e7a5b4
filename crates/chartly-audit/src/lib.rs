// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hash-chained audit ledger.
//!
//! [`event::CanonicalEvent`] is the unit record; [`chain::build_chain`] and
//! [`chain::verify_chain`] fold an ordered event set into a tamper-evident
//! [`chain::Chain`]; [`store::AuditStore`] is the append-only, tenant-scoped
//! storage contract a durable backend implements.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod event;
pub mod store;

pub use chain::{build_chain, verify_chain, verify_events, Chain, ChainError, ChainLink, VerifyOptions, GENESIS};
pub use event::{CanonicalEvent, EventError};
pub use store::{AuditStore, InMemoryAuditStore, StoredEvent, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
