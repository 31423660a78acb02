//! Generic document shape exchanged with the object store.
//!
//! # Responsibility
//! - Represent one stored record as a class name, an id and named fields.
//! - Carry pending many-to-many additions until the next save.
//!
//! # Invariants
//! - `id` is `None` until the store assigns one on first save.
//! - `FieldValue::Object` only appears on read results for included keys;
//!   writes collapse it back into a pointer.
//! - Pending relation additions never hold the same target twice.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Store-assigned record identity.
pub type ObjectId = Uuid;

/// Reference token pointing at one stored record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pointer {
    pub class_name: String,
    pub object_id: ObjectId,
}

impl Pointer {
    pub fn new(class_name: impl Into<String>, object_id: ObjectId) -> Self {
        Self {
            class_name: class_name.into(),
            object_id,
        }
    }
}

impl Display for Pointer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.class_name, self.object_id)
    }
}

/// One field value of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Number(i64),
    Text(String),
    Pointer(Pointer),
    /// Pointer expanded by `Query::include`.
    Object(Box<StoreObject>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Pointer target for both plain and expanded pointers.
    pub fn as_pointer(&self) -> Option<Pointer> {
        match self {
            Self::Pointer(pointer) => Some(pointer.clone()),
            Self::Object(object) => object.to_pointer(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&StoreObject> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    fn collapsed(&self) -> FieldValue {
        match self {
            Self::Object(object) => object
                .to_pointer()
                .map_or(FieldValue::Null, FieldValue::Pointer),
            other => other.clone(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<Pointer> for FieldValue {
    fn from(value: Pointer) -> Self {
        Self::Pointer(value)
    }
}

/// One record as seen through the generic store interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreObject {
    pub class_name: String,
    pub id: Option<ObjectId>,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(skip)]
    relation_ops: BTreeMap<String, Vec<Pointer>>,
}

impl StoreObject {
    /// Creates an unsaved record of `class_name`.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            id: None,
            fields: BTreeMap::new(),
            relation_ops: BTreeMap::new(),
        }
    }

    /// Creates a record handle that already carries a store id.
    pub fn with_id(class_name: impl Into<String>, id: ObjectId) -> Self {
        let mut object = Self::new(class_name);
        object.id = Some(id);
        object
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Text field accessor; `None` when missing or not text.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    /// Returns the many-to-many relation `key` for pending mutations.
    pub fn relation(&mut self, key: &str) -> RelationMut<'_> {
        RelationMut {
            targets: self.relation_ops.entry(key.to_string()).or_default(),
        }
    }

    /// Relation additions that the next `save` will apply.
    pub fn pending_relations(&self) -> &BTreeMap<String, Vec<Pointer>> {
        &self.relation_ops
    }

    /// Reference token for this record; `None` while unsaved.
    pub fn to_pointer(&self) -> Option<Pointer> {
        self.id.map(|id| Pointer::new(self.class_name.clone(), id))
    }

    /// Field map in persisted shape (expanded pointers collapsed).
    pub fn fields_for_write(&self) -> BTreeMap<String, FieldValue> {
        self.fields
            .iter()
            .map(|(key, value)| (key.clone(), value.collapsed()))
            .collect()
    }

    /// Copy of this record as returned by a save: id set, no pending ops.
    pub(crate) fn saved_as(&self, id: ObjectId) -> StoreObject {
        StoreObject {
            class_name: self.class_name.clone(),
            id: Some(id),
            fields: self.fields_for_write(),
            relation_ops: BTreeMap::new(),
        }
    }
}

/// Pending mutation view over one many-to-many relation.
pub struct RelationMut<'a> {
    targets: &'a mut Vec<Pointer>,
}

impl RelationMut<'_> {
    /// Queues `targets` for addition; already queued targets are skipped.
    pub fn add(&mut self, targets: impl IntoIterator<Item = Pointer>) {
        for target in targets {
            if !self.targets.contains(&target) {
                self.targets.push(target);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldValue, Pointer, StoreObject};
    use uuid::Uuid;

    #[test]
    fn relation_add_skips_duplicate_targets() {
        let target = Pointer::new("Author", Uuid::new_v4());
        let mut book = StoreObject::new("Book");
        book.relation("authors").add([target.clone(), target.clone()]);
        book.relation("authors").add([target.clone()]);

        assert_eq!(book.pending_relations()["authors"], vec![target]);
    }

    #[test]
    fn fields_for_write_collapses_expanded_pointers() {
        let publisher = StoreObject::with_id("Publisher", Uuid::new_v4());
        let pointer = publisher.to_pointer().expect("saved publisher has pointer");
        let mut book = StoreObject::new("Book");
        book.set("publisher", FieldValue::Object(Box::new(publisher)));

        let written = book.fields_for_write();
        assert_eq!(written["publisher"], FieldValue::Pointer(pointer));
    }

    #[test]
    fn unsaved_object_has_no_pointer() {
        assert!(StoreObject::new("Genre").to_pointer().is_none());
    }
}
