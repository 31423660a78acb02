//! Catalog domain model.
//!
//! # Responsibility
//! - Define statically typed records for books and reference entities.
//! - Keep the generic store representation out of business signatures.
//!
//! # Invariants
//! - Every entity is identified by its store-assigned `ObjectId`.
//! - Mapping to/from `StoreObject` happens in the repository layer only.

pub mod book;
pub mod entity;
