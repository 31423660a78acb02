//! Book use-case service.
//!
//! # Responsibility
//! - Create books with all associations in the order the ISBD policy needs.
//! - Run filtered book list queries.
//!
//! # Invariants
//! - Validation, the existence check of every selected reference and the
//!   uniqueness guard run before any store write; a refused create leaves
//!   the store untouched.
//! - The returned record carries the references as stored, never the
//!   caller's copies.
//! - The ISBD record (when the policy creates one) is saved strictly before
//!   the book that points at it.
//! - A book write that fails after its ISBD record was saved is reported as
//!   `ServiceError::OrphanedIsbd`; no compensating delete is attempted.

use crate::cancel::CancellationToken;
use crate::config::CatalogConfig;
use crate::mapping::association::{build_book_payload, IsbdStep};
use crate::model::book::{BookInput, BookRecord, IsbdValue};
use crate::model::entity::{ReferenceClass, ReferenceEntity, ValidationError, NAME_FIELD};
use crate::repo::book_query::{BookFilters, BookQueryRepository};
use crate::repo::reference_repo::{check_cancelled, ReferenceRepository};
use crate::repo::uniqueness::ensure_unique;
use crate::service::error::ServiceError;
use crate::store::ObjectStore;
use log::{info, warn};
use std::time::Instant;

/// Book service facade over an object store.
pub struct BookService<S: ObjectStore> {
    store: S,
    config: CatalogConfig,
}

impl<S: ObjectStore> BookService<S> {
    pub fn new(store: S, config: CatalogConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> CatalogConfig {
        self.config
    }

    /// Creates one book and its associations.
    ///
    /// Store round-trips, in order: one lookup per selected publisher, genre
    /// and distinct author, uniqueness check and ISBD save (record policies
    /// only), then one book save carrying the pointer fields and the author
    /// relation additions.
    pub fn create_book(
        &self,
        input: &BookInput,
        token: &CancellationToken,
    ) -> Result<BookRecord, ServiceError> {
        let started_at = Instant::now();
        let policy = self.config.isbd_policy;
        let mut plan = build_book_payload(input, policy)?;

        let references = ReferenceRepository::new(&self.store);
        let publisher = existing(&references, input.publisher.as_ref(), token)?;
        let genre = existing(&references, input.genre.as_ref(), token)?;
        let authors = distinct_authors(&input.authors)
            .iter()
            .map(|author| existing(&references, Some(author), token))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        let linked_isbd = match &plan.isbd {
            IsbdStep::Embedded => None,
            IsbdStep::CreateRecord {
                name,
                require_unique,
            } => {
                if *require_unique {
                    let duplicate = ensure_unique(
                        &self.store,
                        ReferenceClass::Isbd.class_name(),
                        NAME_FIELD,
                        name.as_str(),
                        token,
                    )?;
                    if duplicate.is_some() {
                        warn!(
                            "event=book_create module=service status=conflict policy={}",
                            policy
                        );
                        return Err(ServiceError::Conflict { isbd: name.clone() });
                    }
                }
                Some(references.create(ReferenceClass::Isbd, name, token)?)
            }
        };
        if let Some(isbd) = &linked_isbd {
            plan.link_isbd(isbd);
        }

        let saved = check_cancelled(token)
            .map_err(ServiceError::from)
            .and_then(|()| self.store.save(&plan.book).map_err(ServiceError::from));
        let saved = match (saved, &linked_isbd) {
            (Ok(saved), _) => saved,
            (Err(err), Some(isbd)) => {
                warn!(
                    "event=book_create module=service status=orphaned isbd_id={} error={}",
                    isbd.id, err
                );
                return Err(ServiceError::OrphanedIsbd {
                    isbd_id: isbd.id,
                    cause: Box::new(err),
                });
            }
            (Err(err), None) => return Err(err),
        };
        let id = saved.id.ok_or_else(|| {
            ServiceError::InvalidData("saved book returned without an id".to_string())
        })?;

        info!(
            "event=book_create module=service status=ok policy={} object_id={} authors={} duration_ms={}",
            policy,
            id,
            authors.len(),
            started_at.elapsed().as_millis()
        );

        Ok(BookRecord {
            id,
            title: input.title.trim().to_string(),
            year: input.year.filter(|year| *year != 0),
            isbd: match linked_isbd {
                Some(isbd) => IsbdValue::Linked(isbd),
                None => IsbdValue::Embedded(input.isbd.clone()),
            },
            publisher,
            genre,
            authors,
        })
    }

    /// Runs the book list query for `filters`.
    pub fn query_books(
        &self,
        filters: &BookFilters,
        token: &CancellationToken,
    ) -> Result<Vec<BookRecord>, ServiceError> {
        let repo = BookQueryRepository::new(&self.store, self.config.isbd_policy);
        Ok(repo.query_books(filters, token)?)
    }
}

/// Looks `selected` up again; a handle whose record is gone is stale.
fn existing<S: ObjectStore>(
    references: &ReferenceRepository<S>,
    selected: Option<&ReferenceEntity>,
    token: &CancellationToken,
) -> Result<Option<ReferenceEntity>, ServiceError> {
    let Some(selected) = selected else {
        return Ok(None);
    };
    match references.find_by_id(selected.class, selected.id, token)? {
        Some(stored) => Ok(Some(stored)),
        None => {
            warn!(
                "event=book_create module=service status=stale class={} object_id={}",
                selected.class, selected.id
            );
            Err(ValidationError::StaleSelection {
                class: selected.class,
                id: selected.id.to_string(),
            }
            .into())
        }
    }
}

/// Relation membership is a set; repeated selections persist once.
fn distinct_authors(authors: &[ReferenceEntity]) -> Vec<ReferenceEntity> {
    let mut distinct: Vec<ReferenceEntity> = Vec::with_capacity(authors.len());
    for author in authors {
        if !distinct.iter().any(|seen| seen.same_entity(author)) {
            distinct.push(author.clone());
        }
    }
    distinct
}

#[cfg(test)]
mod tests {
    use super::BookService;
    use crate::cancel::CancellationToken;
    use crate::config::{CatalogConfig, IsbdPolicy};
    use crate::model::book::{BookInput, IsbdValue};
    use crate::model::entity::{ReferenceClass, ReferenceEntity, ValidationError};
    use crate::repo::reference_repo::ReferenceRepository;
    use crate::service::error::ServiceError;
    use crate::store::InMemoryStore;

    fn seeded(store: &InMemoryStore) -> (ReferenceEntity, ReferenceEntity) {
        let repo = ReferenceRepository::new(store);
        let token = CancellationToken::new();
        (
            repo.create(ReferenceClass::Publisher, "Acme", &token)
                .unwrap(),
            repo.create(ReferenceClass::Author, "Ann", &token).unwrap(),
        )
    }

    fn input(publisher: &ReferenceEntity, author: &ReferenceEntity) -> BookInput {
        BookInput {
            title: " T ".to_string(),
            isbd: "978-1".to_string(),
            publisher: Some(publisher.clone()),
            authors: vec![author.clone(), author.clone()],
            ..BookInput::default()
        }
    }

    #[test]
    fn unique_policy_saves_isbd_then_book() {
        let store = InMemoryStore::new();
        let (publisher, author) = seeded(&store);
        let writes_before = store.write_count();
        let service = BookService::new(&store, CatalogConfig::new(IsbdPolicy::Unique));

        let book = service
            .create_book(&input(&publisher, &author), &CancellationToken::new())
            .unwrap();

        assert_eq!(book.title, "T");
        assert!(matches!(book.isbd, IsbdValue::Linked(ref isbd) if isbd.name == "978-1"));
        assert_eq!(book.authors, vec![author]);
        assert_eq!(store.write_count() - writes_before, 2);
    }

    #[test]
    fn embedded_policy_writes_one_record() {
        let store = InMemoryStore::new();
        let (publisher, author) = seeded(&store);
        let writes_before = store.write_count();
        let service = BookService::new(&store, CatalogConfig::new(IsbdPolicy::Embedded));

        let book = service
            .create_book(&input(&publisher, &author), &CancellationToken::new())
            .unwrap();

        assert_eq!(book.isbd, IsbdValue::Embedded("978-1".to_string()));
        assert_eq!(store.write_count() - writes_before, 1);
        assert_eq!(store.object_count("ISBD"), 0);
    }

    #[test]
    fn validation_failure_writes_nothing() {
        let store = InMemoryStore::new();
        let (publisher, author) = seeded(&store);
        let writes_before = store.write_count();
        let service = BookService::new(&store, CatalogConfig::default());

        let mut blank = input(&publisher, &author);
        blank.title = "  ".to_string();
        let err = service
            .create_book(&blank, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::EmptyTitle)
        ));
        assert_eq!(store.write_count(), writes_before);
    }

    #[test]
    fn cancelled_token_before_start_writes_nothing() {
        let store = InMemoryStore::new();
        let (publisher, author) = seeded(&store);
        let writes_before = store.write_count();
        let service = BookService::new(&store, CatalogConfig::default());
        let token = CancellationToken::new();
        token.cancel();

        let err = service
            .create_book(&input(&publisher, &author), &token)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Cancelled));
        assert_eq!(store.write_count(), writes_before);
    }
}
