//! Book list query builder and reader.
//!
//! # Responsibility
//! - Translate sparse list filters into one composed store query.
//! - Resolve each returned book's `authors` relation into handles.
//! - Map book store records to `BookRecord`.
//!
//! # Invariants
//! - Present filters combine by logical AND; no filters returns every book.
//! - A year bound of 0 means "no bound".
//! - Author resolution issues one extra query per returned book.

use crate::cancel::CancellationToken;
use crate::config::IsbdPolicy;
use crate::model::book::{
    BookRecord, IsbdValue, AUTHORS_RELATION, GENRE_FIELD, ISBD_FIELD, PUBLISHER_FIELD,
    TITLE_FIELD, YEAR_FIELD,
};
use crate::model::entity::{ReferenceClass, ReferenceEntity, ValidationError, BOOK_CLASS};
use crate::repo::reference_repo::{
    check_cancelled, reference_from_object, RepoError, RepoResult,
};
use crate::store::{FieldValue, ObjectStore, Pointer, Query, StoreObject};
use log::info;
use std::time::Instant;

/// Sort directive on book titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleOrdering {
    #[default]
    Ascending,
    Descending,
    Unordered,
}

impl TitleOrdering {
    /// Parses the list screen radio values; anything else means unordered.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "ascending" => Self::Ascending,
            "descending" => Self::Descending,
            _ => Self::Unordered,
        }
    }
}

/// Filters chosen on the book list screen.
///
/// `Default` is the cleared state: ascending by title, nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilters {
    pub ordering: TitleOrdering,
    /// Case-sensitive substring; empty means no filter.
    pub title_contains: String,
    /// Inclusive lower bound; `Some(0)` counts as absent.
    pub year_from: Option<i32>,
    /// Inclusive upper bound; `Some(0)` counts as absent.
    pub year_to: Option<i32>,
    pub publisher: Option<ReferenceEntity>,
    pub genre: Option<ReferenceEntity>,
    pub isbd: Option<ReferenceEntity>,
    pub author: Option<ReferenceEntity>,
}

/// Parses a year text field; empty text and `0` mean "no bound".
pub fn parse_year_bound(text: &str) -> Result<Option<i32>, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let year = trimmed
        .parse::<i32>()
        .map_err(|_| ValidationError::InvalidYear(trimmed.to_string()))?;
    Ok(nonzero(Some(year)))
}

fn nonzero(bound: Option<i32>) -> Option<i32> {
    bound.filter(|year| *year != 0)
}

/// Composes book list queries for one ISBD policy.
#[derive(Debug, Clone, Copy)]
pub struct BookQueryBuilder {
    policy: IsbdPolicy,
}

impl BookQueryBuilder {
    pub fn new(policy: IsbdPolicy) -> Self {
        Self { policy }
    }

    /// Builds the base book query for `filters`.
    pub fn build_query(&self, filters: &BookFilters) -> Query {
        let mut query = Query::new(BOOK_CLASS);
        query.include(PUBLISHER_FIELD).include(GENRE_FIELD);
        if self.policy.links_record() {
            query.include(ISBD_FIELD);
        }

        match filters.ordering {
            TitleOrdering::Ascending => {
                query.add_ascending(TITLE_FIELD);
            }
            TitleOrdering::Descending => {
                query.add_descending(TITLE_FIELD);
            }
            TitleOrdering::Unordered => {}
        }

        if !filters.title_contains.is_empty() {
            query.contains(TITLE_FIELD, filters.title_contains.as_str());
        }
        if let Some(from) = nonzero(filters.year_from) {
            query.greater_than_or_equal_to(YEAR_FIELD, i64::from(from));
        }
        if let Some(to) = nonzero(filters.year_to) {
            query.less_than_or_equal_to(YEAR_FIELD, i64::from(to));
        }

        if let Some(publisher) = &filters.publisher {
            query.equal_to(PUBLISHER_FIELD, publisher.to_pointer());
        }
        if let Some(genre) = &filters.genre {
            query.equal_to(GENRE_FIELD, genre.to_pointer());
        }
        if let Some(isbd) = &filters.isbd {
            if self.policy.links_record() {
                query.equal_to(ISBD_FIELD, isbd.to_pointer());
            } else {
                query.equal_to(ISBD_FIELD, isbd.name.as_str());
            }
        }
        if let Some(author) = &filters.author {
            query.equal_to(AUTHORS_RELATION, author.to_pointer());
        }

        query
    }
}

/// Book list reader over an object store.
pub struct BookQueryRepository<S: ObjectStore> {
    store: S,
    builder: BookQueryBuilder,
}

impl<S: ObjectStore> BookQueryRepository<S> {
    pub fn new(store: S, policy: IsbdPolicy) -> Self {
        Self {
            store,
            builder: BookQueryBuilder::new(policy),
        }
    }

    /// Runs the filtered book query and resolves every book's authors.
    pub fn query_books(
        &self,
        filters: &BookFilters,
        token: &CancellationToken,
    ) -> RepoResult<Vec<BookRecord>> {
        let started_at = Instant::now();
        check_cancelled(token)?;
        let query = self.builder.build_query(filters);
        let rows = self.store.find(&query)?;

        let mut books = Vec::with_capacity(rows.len());
        for row in &rows {
            let pointer = row.to_pointer().ok_or_else(|| {
                RepoError::InvalidData("book record returned without an id".to_string())
            })?;
            let authors = self.resolve_authors(&pointer, token)?;
            books.push(book_from_object(row, authors)?);
        }

        info!(
            "event=books_query module=repo status=ok constraints={} count={} duration_ms={}",
            query.constraints().len(),
            books.len(),
            started_at.elapsed().as_millis()
        );
        Ok(books)
    }

    /// Loads the members of one book's `authors` relation, in insertion order.
    pub fn resolve_authors(
        &self,
        book: &Pointer,
        token: &CancellationToken,
    ) -> RepoResult<Vec<ReferenceEntity>> {
        check_cancelled(token)?;
        let mut query = Query::new(ReferenceClass::Author.class_name());
        query.related_to(book.clone(), AUTHORS_RELATION);
        self.store
            .find(&query)?
            .iter()
            .map(|row| reference_from_object(ReferenceClass::Author, row))
            .collect()
    }
}

/// Maps a book store record (with included pointers) to `BookRecord`.
pub(crate) fn book_from_object(
    object: &StoreObject,
    authors: Vec<ReferenceEntity>,
) -> RepoResult<BookRecord> {
    let id = object
        .id
        .ok_or_else(|| RepoError::InvalidData("book record returned without an id".to_string()))?;
    let title = object
        .text(TITLE_FIELD)
        .ok_or_else(|| RepoError::InvalidData(format!("book `{id}` has no text `title`")))?
        .to_string();

    let year = match object.get(YEAR_FIELD) {
        Some(FieldValue::Number(value)) => Some(i32::try_from(*value).map_err(|_| {
            RepoError::InvalidData(format!("book `{id}` has out-of-range year {value}"))
        })?),
        Some(FieldValue::Null) | None => None,
        Some(other) => {
            return Err(RepoError::InvalidData(format!(
                "book `{id}` has non-numeric year {other:?}"
            )));
        }
    };

    let isbd = match object.get(ISBD_FIELD) {
        Some(FieldValue::Text(value)) => IsbdValue::Embedded(value.clone()),
        Some(FieldValue::Object(target)) => {
            IsbdValue::Linked(reference_from_object(ReferenceClass::Isbd, target)?)
        }
        _ => IsbdValue::Missing,
    };

    Ok(BookRecord {
        id,
        title,
        year,
        isbd,
        publisher: included_reference(object, PUBLISHER_FIELD, ReferenceClass::Publisher)?,
        genre: included_reference(object, GENRE_FIELD, ReferenceClass::Genre)?,
        authors,
    })
}

fn included_reference(
    object: &StoreObject,
    key: &str,
    class: ReferenceClass,
) -> RepoResult<Option<ReferenceEntity>> {
    object
        .get(key)
        .and_then(FieldValue::as_object)
        .map(|target| reference_from_object(class, target))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::{parse_year_bound, BookFilters, BookQueryBuilder, TitleOrdering};
    use crate::config::IsbdPolicy;
    use crate::model::entity::{ReferenceClass, ReferenceEntity, ValidationError};
    use crate::store::{Constraint, FieldValue, SortDirection};
    use uuid::Uuid;

    #[test]
    fn cleared_filters_only_sort_by_title() {
        let query = BookQueryBuilder::new(IsbdPolicy::Unique).build_query(&BookFilters::default());
        assert!(query.constraints().is_empty());
        assert_eq!(query.sort_keys().len(), 1);
        assert_eq!(query.sort_keys()[0].direction, SortDirection::Ascending);
        assert!(query.includes().contains("isbd"));
    }

    #[test]
    fn zero_year_bounds_apply_no_constraint() {
        let filters = BookFilters {
            year_from: Some(0),
            year_to: Some(0),
            ordering: TitleOrdering::Unordered,
            ..BookFilters::default()
        };
        let query = BookQueryBuilder::new(IsbdPolicy::Unique).build_query(&filters);
        assert!(query.constraints().is_empty());
        assert!(query.sort_keys().is_empty());
    }

    #[test]
    fn year_bounds_are_independent() {
        let filters = BookFilters {
            year_to: Some(2000),
            ..BookFilters::default()
        };
        let query = BookQueryBuilder::new(IsbdPolicy::Unique).build_query(&filters);
        assert_eq!(
            query.constraints(),
            &[Constraint::LessThanOrEqualTo {
                key: "year".to_string(),
                value: 2000
            }]
        );
    }

    #[test]
    fn embedded_policy_filters_isbd_by_text() {
        let isbd = ReferenceEntity::new(Uuid::new_v4(), ReferenceClass::Isbd, "978-1");
        let filters = BookFilters {
            isbd: Some(isbd),
            ..BookFilters::default()
        };
        let query = BookQueryBuilder::new(IsbdPolicy::Embedded).build_query(&filters);
        assert_eq!(
            query.constraints(),
            &[Constraint::EqualTo {
                key: "isbd".to_string(),
                value: FieldValue::Text("978-1".to_string())
            }]
        );
        assert!(!query.includes().contains("isbd"));
    }

    #[test]
    fn parse_year_bound_treats_empty_and_zero_as_absent() {
        assert_eq!(parse_year_bound(""), Ok(None));
        assert_eq!(parse_year_bound(" 0 "), Ok(None));
        assert_eq!(parse_year_bound("1984"), Ok(Some(1984)));
        assert_eq!(
            parse_year_bound("soon"),
            Err(ValidationError::InvalidYear("soon".to_string()))
        );
    }

    #[test]
    fn ordering_parse_maps_unknown_values_to_unordered() {
        assert_eq!(TitleOrdering::parse("descending"), TitleOrdering::Descending);
        assert_eq!(TitleOrdering::parse(""), TitleOrdering::Unordered);
    }
}
