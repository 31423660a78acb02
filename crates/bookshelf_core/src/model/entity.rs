//! Reference entity model (Publisher, Author, Genre, ISBD).
//!
//! # Responsibility
//! - Name the reference classes the catalog reads and creates.
//! - Define the typed handle used for selections and associations.
//!
//! # Invariants
//! - A handle is identified by its store-assigned `id`; two handles with the
//!   same `name` but different ids are different entities.
//! - `class` always matches the store class the handle was read from.

use crate::store::{ObjectId, Pointer};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store class name for book records.
pub const BOOK_CLASS: &str = "Book";
/// Attribute holding the display name of every reference entity.
pub const NAME_FIELD: &str = "name";

/// Reference data classes shown as choices on catalog screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReferenceClass {
    Publisher,
    Author,
    Genre,
    Isbd,
}

impl ReferenceClass {
    /// Classes loaded by the book creation form, in load order.
    pub const BOOK_FORM: [ReferenceClass; 3] = [Self::Publisher, Self::Author, Self::Genre];
    /// Classes loaded by the book list filters, in load order.
    pub const BOOK_LIST: [ReferenceClass; 4] =
        [Self::Publisher, Self::Author, Self::Genre, Self::Isbd];

    /// Stable class name used by the object store.
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Publisher => "Publisher",
            Self::Author => "Author",
            Self::Genre => "Genre",
            Self::Isbd => "ISBD",
        }
    }

    /// Parses a store class name (as passed by navigation parameters).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Publisher" => Some(Self::Publisher),
            "Author" => Some(Self::Author),
            "Genre" => Some(Self::Genre),
            "ISBD" => Some(Self::Isbd),
            _ => None,
        }
    }
}

impl Display for ReferenceClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Typed handle for one persisted reference entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    /// Store-assigned identity. Selection comparisons use this field only.
    pub id: ObjectId,
    pub class: ReferenceClass,
    pub name: String,
}

impl ReferenceEntity {
    pub fn new(id: ObjectId, class: ReferenceClass, name: impl Into<String>) -> Self {
        Self {
            id,
            class,
            name: name.into(),
        }
    }

    /// Reference token stored in pointer fields and relations.
    pub fn to_pointer(&self) -> Pointer {
        Pointer::new(self.class.class_name(), self.id)
    }

    /// Identity comparison (store id), never attribute comparison.
    pub fn same_entity(&self, other: &ReferenceEntity) -> bool {
        self.id == other.id
    }

    /// Ensures this handle may fill a slot that expects `expected`.
    pub fn expect_class(
        &self,
        field: &'static str,
        expected: ReferenceClass,
    ) -> Result<(), ValidationError> {
        if self.class == expected {
            Ok(())
        } else {
            Err(ValidationError::WrongClass {
                field,
                expected,
                actual: self.class,
            })
        }
    }
}

/// Input validation failures raised before any store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Reference entity name is blank.
    EmptyName(ReferenceClass),
    /// Book title is blank.
    EmptyTitle,
    /// ISBD text is blank while the active policy needs an ISBD record.
    EmptyIsbd,
    /// A required relation has no selection.
    MissingSelection(&'static str),
    /// A handle of the wrong class was passed for a relation slot.
    WrongClass {
        field: &'static str,
        expected: ReferenceClass,
        actual: ReferenceClass,
    },
    /// Unknown reference class name.
    UnknownClass(String),
    /// Year filter text is not a number.
    InvalidYear(String),
    /// Id text received from the UI cannot be parsed.
    InvalidId(String),
    /// Selected id no longer resolves to a record of `class`.
    StaleSelection { class: ReferenceClass, id: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName(class) => write!(f, "{class} name must not be empty"),
            Self::EmptyTitle => write!(f, "book title must not be empty"),
            Self::EmptyIsbd => write!(f, "ISBD must not be empty"),
            Self::MissingSelection(field) => write!(f, "{field} must be selected"),
            Self::WrongClass {
                field,
                expected,
                actual,
            } => write!(f, "{field} expects a {expected}, got a {actual}"),
            Self::UnknownClass(value) => write!(f, "unknown object type `{value}`"),
            Self::InvalidYear(value) => write!(f, "year must be a number, got `{value}`"),
            Self::InvalidId(value) => write!(f, "invalid object id `{value}`"),
            Self::StaleSelection { class, id } => {
                write!(f, "selected {class} `{id}` no longer exists")
            }
        }
    }
}

impl Error for ValidationError {}

/// Trims and validates a reference entity name.
pub fn normalize_name(class: ReferenceClass, name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName(class));
    }
    Ok(trimmed.to_string())
}
