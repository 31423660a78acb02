//! Core data-access layer for the Bookshelf catalog.
//! Book associations, reference choices and list queries live here; UI
//! layers talk to it through `bookshelf_ffi`.

pub mod cancel;
pub mod config;
pub mod db;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use cancel::CancellationToken;
pub use config::{CatalogConfig, IsbdPolicy};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use mapping::association::{build_book_payload, toggle_author, BookWritePlan, IsbdStep};
pub use model::book::{BookInput, BookRecord, IsbdValue};
pub use model::entity::{ReferenceClass, ReferenceEntity, ValidationError};
pub use repo::book_query::{
    parse_year_bound, BookFilters, BookQueryBuilder, BookQueryRepository, TitleOrdering,
};
pub use repo::reference_repo::{
    ChoiceFailure, ChoiceLoad, ChoiceSnapshot, ReferenceRepository, RepoError, RepoResult,
};
pub use repo::uniqueness::ensure_unique;
pub use service::book_service::BookService;
pub use service::error::ServiceError;
pub use service::reference_service::ReferenceService;
pub use service::screen::ScreenSession;
pub use store::{InMemoryStore, ObjectStore, SqliteObjectStore, StoreError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
