//! Catalog configuration.
//!
//! # Responsibility
//! - Declare which one-to-one ISBD policy a catalog runs with.
//! - Parse configuration values received as text (env, FFI).
//!
//! # Invariants
//! - Exactly one ISBD policy is active per catalog; policies never mix.

use std::fmt::{Display, Formatter};

/// How a book's one-to-one `isbd` association is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsbdPolicy {
    /// Plain string field on the book.
    Embedded,
    /// New ISBD record holding the text, referenced by the book.
    Reference,
    /// Like `Reference`, but refuses an ISBD text that already exists.
    #[default]
    Unique,
}

impl IsbdPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Reference => "reference",
            Self::Unique => "unique",
        }
    }

    /// Parses `embedded|reference|unique` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "embedded" => Some(Self::Embedded),
            "reference" => Some(Self::Reference),
            "unique" => Some(Self::Unique),
            _ => None,
        }
    }

    /// Whether the book's `isbd` field holds a pointer to an ISBD record.
    pub fn links_record(self) -> bool {
        !matches!(self, Self::Embedded)
    }
}

impl Display for IsbdPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by catalog services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogConfig {
    pub isbd_policy: IsbdPolicy,
}

impl CatalogConfig {
    pub fn new(isbd_policy: IsbdPolicy) -> Self {
        Self { isbd_policy }
    }
}
