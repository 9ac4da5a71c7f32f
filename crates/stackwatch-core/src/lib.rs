//! stackwatch-core — shared domain types for watching a stack rollout.
//!
//! The orchestrator reports rollout progress per service. This crate holds
//! the vocabulary every other crate speaks: service descriptors captured at
//! inventory time, the update status reported on every poll, the tracked
//! pairing of the two, and the error taxonomy for transport and decoding
//! failures.
//!
//! # Identifiers
//!
//! Status queries echo back a shortened service identifier. All lookups go
//! through [`short_id`] so inventory and status records meet on the same key.

pub mod error;
pub mod types;

pub use error::{TransportError, WatchError, WatchResult};
pub use types::*;
