// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tamper-evident case envelope: a validated lifecycle state machine with a
//! self-referential hash chain, plus the [`EntityRef`] type cases reference.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod case;
mod entity;

pub use case::{Case, CaseError, CaseStatus, MAX_TITLE_LEN};
pub use entity::{EntityRef, EntityRefError};
