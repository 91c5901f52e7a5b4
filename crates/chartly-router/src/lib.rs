// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tenant sharding, lease-based leader election, and overload-aware job
//! routing for the worker-pool runtime's producer side.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod elector;
mod lease;
mod router;
mod sharder;

pub use elector::{
    default_owner_identity, deterministic_sleep, ElectionEvent, LeaderElector, EVENT_CHANNEL_CAPACITY,
    MIN_SLEEP,
};
pub use lease::LeaseStore;
pub use router::{Action, Decision, LocalQueue, Router, RouterError};
pub use sharder::{fnv1a_64, shard_for};
