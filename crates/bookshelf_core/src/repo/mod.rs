//! Repository layer over the object store.
//!
//! # Responsibility
//! - Define use-case oriented read/write contracts for catalog data.
//! - Keep generic store record shapes out of services and callers.
//!
//! # Invariants
//! - Every store round-trip is preceded by a cancellation check.
//! - Read paths reject records that cannot be mapped to typed models.

pub mod book_query;
pub mod reference_repo;
pub mod uniqueness;
