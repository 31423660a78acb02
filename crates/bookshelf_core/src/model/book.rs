//! Book domain model.
//!
//! # Responsibility
//! - Define the creation input collected by the book form.
//! - Define the read model returned by book list queries.
//!
//! # Invariants
//! - `publisher` and `genre` reference exactly one entity of their class.
//! - `authors` never contains the same entity twice.

use crate::model::entity::ReferenceEntity;
use crate::store::ObjectId;
use serde::{Deserialize, Serialize};

pub const TITLE_FIELD: &str = "title";
pub const ISBD_FIELD: &str = "isbd";
pub const YEAR_FIELD: &str = "year";
pub const PUBLISHER_FIELD: &str = "publisher";
pub const GENRE_FIELD: &str = "genre";
/// Many-to-many relation key on book records.
pub const AUTHORS_RELATION: &str = "authors";

/// Values collected by the book creation form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookInput {
    pub title: String,
    /// Free-text ISBD as typed by the user.
    pub isbd: String,
    pub year: Option<i32>,
    pub publisher: Option<ReferenceEntity>,
    pub genre: Option<ReferenceEntity>,
    /// Checked authors, in selection order.
    pub authors: Vec<ReferenceEntity>,
}

/// ISBD as persisted on a book record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsbdValue {
    /// Stored as a plain string field.
    Embedded(String),
    /// Stored as a reference to an ISBD record.
    Linked(ReferenceEntity),
    /// Field absent or pointing at a record that no longer resolves.
    Missing,
}

impl IsbdValue {
    /// Display text regardless of storage shape.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Embedded(value) => Some(value.as_str()),
            Self::Linked(entity) => Some(entity.name.as_str()),
            Self::Missing => None,
        }
    }
}

/// Book row returned by list queries with its associations resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: ObjectId,
    pub title: String,
    pub year: Option<i32>,
    pub isbd: IsbdValue,
    pub publisher: Option<ReferenceEntity>,
    pub genre: Option<ReferenceEntity>,
    /// Resolved many-to-many membership.
    pub authors: Vec<ReferenceEntity>,
}

impl BookRecord {
    /// One-line summary in the shape shown by the book list.
    pub fn describe(&self) -> String {
        let publisher = self.publisher.as_ref().map_or("", |p| p.name.as_str());
        let genre = self.genre.as_ref().map_or("", |g| g.name.as_str());
        let year = self.year.map(|y| y.to_string()).unwrap_or_default();
        let authors = self
            .authors
            .iter()
            .map(|author| author.name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "Publisher: {publisher}, Year: {year}, ISBD: {}, Genre: {genre}, Author(s): {authors}",
            self.isbd.text().unwrap_or("")
        )
    }
}
