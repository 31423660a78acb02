//! Mapping from the typed book graph to generic store writes.
//!
//! # Responsibility
//! - Turn validated form input into ordered store write plans.
//! - Keep relation-cardinality rules in one place.

pub mod association;
