//! Association mapper for book writes.
//!
//! # Responsibility
//! - Encode each book association by cardinality into store writes.
//! - Own the author checkbox toggle semantics.
//!
//! # Invariants
//! - One-to-many (`publisher`, `genre`): pointer field on the book.
//! - Many-to-many (`authors`): one relation `add` with the whole set.
//! - One-to-one (`isbd`): shape decided by the declared `IsbdPolicy` only.
//! - The mapper performs no I/O; it only produces a `BookWritePlan`.

use crate::config::IsbdPolicy;
use crate::model::book::{
    BookInput, AUTHORS_RELATION, GENRE_FIELD, ISBD_FIELD, PUBLISHER_FIELD, TITLE_FIELD,
    YEAR_FIELD,
};
use crate::model::entity::{ReferenceClass, ReferenceEntity, ValidationError, BOOK_CLASS};
use crate::store::StoreObject;

/// What must happen to the ISBD before the book can be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsbdStep {
    /// Text already set on the book record.
    Embedded,
    /// Save an ISBD record named `name` first, then link it.
    CreateRecord { name: String, require_unique: bool },
}

/// Ordered write plan for one book creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookWritePlan {
    /// Unsaved book record with fields and pending author additions.
    pub book: StoreObject,
    pub isbd: IsbdStep,
}

impl BookWritePlan {
    /// Points the book's `isbd` field at a saved ISBD record.
    pub fn link_isbd(&mut self, isbd: &ReferenceEntity) {
        self.book.set(ISBD_FIELD, isbd.to_pointer());
    }
}

/// Builds the write plan for `input` under `policy`.
///
/// # Errors
/// - `EmptyTitle` when the title is blank.
/// - `MissingSelection("publisher")` when no publisher is chosen.
/// - `WrongClass` when a handle of another class fills a slot.
/// - `EmptyIsbd` when the policy creates ISBD records and the text is blank.
pub fn build_book_payload(
    input: &BookInput,
    policy: IsbdPolicy,
) -> Result<BookWritePlan, ValidationError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let publisher = input
        .publisher
        .as_ref()
        .ok_or(ValidationError::MissingSelection(PUBLISHER_FIELD))?;
    publisher.expect_class(PUBLISHER_FIELD, ReferenceClass::Publisher)?;
    if let Some(genre) = &input.genre {
        genre.expect_class(GENRE_FIELD, ReferenceClass::Genre)?;
    }
    for author in &input.authors {
        author.expect_class(AUTHORS_RELATION, ReferenceClass::Author)?;
    }

    let mut book = StoreObject::new(BOOK_CLASS);
    book.set(TITLE_FIELD, title);
    if let Some(year) = input.year.filter(|year| *year != 0) {
        book.set(YEAR_FIELD, i64::from(year));
    }

    // Both one-to-many slots persist as pointers.
    book.set(PUBLISHER_FIELD, publisher.to_pointer());
    if let Some(genre) = &input.genre {
        book.set(GENRE_FIELD, genre.to_pointer());
    }

    if !input.authors.is_empty() {
        book.relation(AUTHORS_RELATION)
            .add(input.authors.iter().map(ReferenceEntity::to_pointer));
    }

    let isbd = match policy {
        IsbdPolicy::Embedded => {
            book.set(ISBD_FIELD, input.isbd.as_str());
            IsbdStep::Embedded
        }
        IsbdPolicy::Reference | IsbdPolicy::Unique => {
            let name = input.isbd.trim();
            if name.is_empty() {
                return Err(ValidationError::EmptyIsbd);
            }
            IsbdStep::CreateRecord {
                name: name.to_string(),
                require_unique: policy == IsbdPolicy::Unique,
            }
        }
    };

    Ok(BookWritePlan { book, isbd })
}

/// Toggles `candidate` in an author selection.
///
/// Removes it when an entity with the same id is selected, otherwise
/// appends it. Applying the same toggle twice restores the input.
pub fn toggle_author(
    current: &[ReferenceEntity],
    candidate: &ReferenceEntity,
) -> Vec<ReferenceEntity> {
    if current.iter().any(|author| author.same_entity(candidate)) {
        current
            .iter()
            .filter(|author| !author.same_entity(candidate))
            .cloned()
            .collect()
    } else {
        let mut next = current.to_vec();
        next.push(candidate.clone());
        next
    }
}
