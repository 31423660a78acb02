//! Object store boundary.
//!
//! # Responsibility
//! - Define the fixed query/save interface the catalog core talks to.
//! - Provide an in-memory store (test double) and a SQLite-backed store.
//!
//! # Invariants
//! - Stores assign ids on first save and never reuse them.
//! - Relation membership is a set: adding an existing target is a no-op.
//! - Result order is store insertion order unless the query sorts.
//! - Transport/backend failures carry a human-readable message that callers
//!   surface verbatim.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod object;
pub mod query;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use object::{FieldValue, ObjectId, Pointer, RelationMut, StoreObject};
pub use query::{Constraint, Query, SortDirection, SortKey};
pub use sqlite::SqliteObjectStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by an object store implementation.
#[derive(Debug)]
pub enum StoreError {
    /// Backend unreachable or rejected the request.
    Unavailable(String),
    Db(DbError),
    /// Persisted document cannot be decoded.
    InvalidData(String),
    /// Save targeted an id the store does not know.
    NotFound(ObjectId),
    MissingRequiredTable(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "{message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored object: {message}"),
            Self::NotFound(id) => write!(f, "object not found: {id}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "store connection is missing table `{table}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Generic document store consumed by repositories and services.
///
/// Each call is one round-trip; implementations do not retry.
pub trait ObjectStore {
    /// Returns every record matching `query`.
    fn find(&self, query: &Query) -> StoreResult<Vec<StoreObject>>;

    /// Returns the first record matching `query`, if any.
    fn first(&self, query: &Query) -> StoreResult<Option<StoreObject>> {
        let mut limited = query.clone();
        limited.limit(1);
        Ok(self.find(&limited)?.into_iter().next())
    }

    /// Inserts (no id) or updates (id set) `object` and applies its pending
    /// relation additions. Returns the persisted record.
    fn save(&self, object: &StoreObject) -> StoreResult<StoreObject>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn find(&self, query: &Query) -> StoreResult<Vec<StoreObject>> {
        (**self).find(query)
    }

    fn first(&self, query: &Query) -> StoreResult<Option<StoreObject>> {
        (**self).first(query)
    }

    fn save(&self, object: &StoreObject) -> StoreResult<StoreObject> {
        (**self).save(object)
    }
}
