//! Query description and shared predicate evaluation.
//!
//! # Responsibility
//! - Describe a class query as chained constraints, sort keys and includes.
//! - Evaluate constraints identically for every store implementation.
//!
//! # Invariants
//! - All constraints combine by logical AND; no constraint matches all.
//! - `contains` is a case-sensitive substring test.
//! - Range constraints never match records missing the field.
//! - Sorting is stable, so ties keep store insertion order.

use crate::store::object::{FieldValue, ObjectId, Pointer, StoreObject};
use crate::store::StoreResult;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// One predicate of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Field equality; on a relation key, matches by relation membership.
    EqualTo { key: String, value: FieldValue },
    Contains { key: String, substring: String },
    GreaterThanOrEqualTo { key: String, value: i64 },
    LessThanOrEqualTo { key: String, value: i64 },
    /// Record is a member of `owner`'s relation `key`.
    RelatedTo { owner: Pointer, key: String },
    ObjectId(ObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub key: String,
    pub direction: SortDirection,
}

/// Chainable query against one store class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    class_name: String,
    constraints: Vec<Constraint>,
    sort: Vec<SortKey>,
    includes: BTreeSet<String>,
    limit: Option<usize>,
}

impl Query {
    /// Unfiltered query over every record of `class_name`.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            constraints: Vec::new(),
            sort: Vec::new(),
            includes: BTreeSet::new(),
            limit: None,
        }
    }

    pub fn class_name(&self) -> &str {
        self.class_name.as_str()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn includes(&self) -> &BTreeSet<String> {
        &self.includes
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn equal_to(&mut self, key: &str, value: impl Into<FieldValue>) -> &mut Self {
        self.constraints.push(Constraint::EqualTo {
            key: key.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn contains(&mut self, key: &str, substring: &str) -> &mut Self {
        self.constraints.push(Constraint::Contains {
            key: key.to_string(),
            substring: substring.to_string(),
        });
        self
    }

    pub fn greater_than_or_equal_to(&mut self, key: &str, value: i64) -> &mut Self {
        self.constraints.push(Constraint::GreaterThanOrEqualTo {
            key: key.to_string(),
            value,
        });
        self
    }

    pub fn less_than_or_equal_to(&mut self, key: &str, value: i64) -> &mut Self {
        self.constraints.push(Constraint::LessThanOrEqualTo {
            key: key.to_string(),
            value,
        });
        self
    }

    /// Restricts results to members of `owner`'s relation `key`.
    pub fn related_to(&mut self, owner: Pointer, key: &str) -> &mut Self {
        self.constraints.push(Constraint::RelatedTo {
            owner,
            key: key.to_string(),
        });
        self
    }

    pub fn with_object_id(&mut self, id: ObjectId) -> &mut Self {
        self.constraints.push(Constraint::ObjectId(id));
        self
    }

    pub fn add_ascending(&mut self, key: &str) -> &mut Self {
        self.push_sort(key, SortDirection::Ascending)
    }

    pub fn add_descending(&mut self, key: &str) -> &mut Self {
        self.push_sort(key, SortDirection::Descending)
    }

    /// Expands pointer field `key` into the full target record on read.
    pub fn include(&mut self, key: &str) -> &mut Self {
        self.includes.insert(key.to_string());
        self
    }

    pub fn limit(&mut self, limit: usize) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    fn push_sort(&mut self, key: &str, direction: SortDirection) -> &mut Self {
        self.sort.push(SortKey {
            key: key.to_string(),
            direction,
        });
        self
    }

    /// Returns whether `object` satisfies every constraint.
    pub(crate) fn matches(
        &self,
        object: &StoreObject,
        index: &dyn RelationIndex,
    ) -> StoreResult<bool> {
        if object.class_name != self.class_name {
            return Ok(false);
        }

        for constraint in &self.constraints {
            if !constraint_matches(constraint, object, index)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Applies sort keys (stable) and the limit to already-filtered rows.
    pub(crate) fn order_and_limit(&self, objects: &mut Vec<StoreObject>) {
        if !self.sort.is_empty() {
            objects.sort_by(|left, right| {
                for sort_key in &self.sort {
                    let ordering = compare_values(
                        left.get(sort_key.key.as_str()),
                        right.get(sort_key.key.as_str()),
                    );
                    let ordering = match sort_key.direction {
                        SortDirection::Ascending => ordering,
                        SortDirection::Descending => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = self.limit {
            objects.truncate(limit);
        }
    }

    /// Replaces included pointer fields with the records they point at.
    ///
    /// Dangling pointers are left as plain pointers.
    pub(crate) fn expand_includes(
        &self,
        objects: &mut [StoreObject],
        load: impl Fn(&Pointer) -> StoreResult<Option<StoreObject>>,
    ) -> StoreResult<()> {
        if self.includes.is_empty() {
            return Ok(());
        }

        for object in objects.iter_mut() {
            for key in &self.includes {
                let pointer = match object.get(key.as_str()) {
                    Some(FieldValue::Pointer(pointer)) => pointer.clone(),
                    _ => continue,
                };
                if let Some(target) = load(&pointer)? {
                    object
                        .fields
                        .insert(key.clone(), FieldValue::Object(Box::new(target)));
                }
            }
        }
        Ok(())
    }
}

/// Relation membership lookup provided by each store implementation.
pub(crate) trait RelationIndex {
    fn members(&self, owner_id: ObjectId, key: &str) -> StoreResult<Vec<Pointer>>;
}

fn constraint_matches(
    constraint: &Constraint,
    object: &StoreObject,
    index: &dyn RelationIndex,
) -> StoreResult<bool> {
    let matched = match constraint {
        Constraint::EqualTo { key, value } => match object.get(key.as_str()) {
            Some(current) => values_equal(current, value),
            None => match (value, object.id) {
                (FieldValue::Null, _) => true,
                (FieldValue::Pointer(target), Some(id)) => {
                    index.members(id, key.as_str())?.contains(target)
                }
                _ => false,
            },
        },
        Constraint::Contains { key, substring } => object
            .text(key.as_str())
            .is_some_and(|text| text.contains(substring.as_str())),
        Constraint::GreaterThanOrEqualTo { key, value } => object
            .get(key.as_str())
            .and_then(FieldValue::as_number)
            .is_some_and(|current| current >= *value),
        Constraint::LessThanOrEqualTo { key, value } => object
            .get(key.as_str())
            .and_then(FieldValue::as_number)
            .is_some_and(|current| current <= *value),
        Constraint::RelatedTo { owner, key } => match object.to_pointer() {
            Some(pointer) => index
                .members(owner.object_id, key.as_str())?
                .contains(&pointer),
            None => false,
        },
        Constraint::ObjectId(id) => object.id == Some(*id),
    };
    Ok(matched)
}

fn values_equal(stored: &FieldValue, expected: &FieldValue) -> bool {
    match (stored.as_pointer(), expected.as_pointer()) {
        (Some(left), Some(right)) => left == right,
        (None, None) => stored == expected,
        _ => false,
    }
}

fn compare_values(left: Option<&FieldValue>, right: Option<&FieldValue>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(FieldValue::Number(a)), Some(FieldValue::Number(b))) => a.cmp(b),
        (Some(FieldValue::Text(a)), Some(FieldValue::Text(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::{Constraint, Query, RelationIndex};
    use crate::store::object::{FieldValue, ObjectId, Pointer, StoreObject};
    use crate::store::StoreResult;
    use uuid::Uuid;

    struct NoRelations;

    impl RelationIndex for NoRelations {
        fn members(&self, _owner_id: ObjectId, _key: &str) -> StoreResult<Vec<Pointer>> {
            Ok(Vec::new())
        }
    }

    fn book(title: &str, year: Option<i64>) -> StoreObject {
        let mut object = StoreObject::with_id("Book", Uuid::new_v4());
        object.set("title", title);
        if let Some(year) = year {
            object.set("year", year);
        }
        object
    }

    #[test]
    fn chained_calls_accumulate_constraints() {
        let mut query = Query::new("Book");
        query.contains("title", "Rust").greater_than_or_equal_to("year", 2000);
        assert_eq!(query.constraints().len(), 2);
        assert!(matches!(
            query.constraints()[0],
            Constraint::Contains { .. }
        ));
    }

    #[test]
    fn contains_is_case_sensitive() {
        let mut query = Query::new("Book");
        query.contains("title", "rust");
        assert!(!query.matches(&book("Rust in Action", None), &NoRelations).unwrap());
        assert!(query.matches(&book("trusty", None), &NoRelations).unwrap());
    }

    #[test]
    fn range_constraints_skip_records_without_the_field() {
        let mut query = Query::new("Book");
        query.less_than_or_equal_to("year", 3000);
        assert!(!query.matches(&book("T", None), &NoRelations).unwrap());
        assert!(query.matches(&book("T", Some(1990)), &NoRelations).unwrap());
    }

    #[test]
    fn descending_sort_is_stable_for_ties() {
        let mut rows = vec![book("b", None), book("a", None), book("b", Some(1))];
        let first_b = rows[0].id;
        let mut query = Query::new("Book");
        query.add_descending("title");
        query.order_and_limit(&mut rows);

        assert_eq!(rows[0].id, first_b);
        assert_eq!(rows[2].text("title"), Some("a"));
    }

    #[test]
    fn pointer_equality_ignores_expanded_shape() {
        let publisher = StoreObject::with_id("Publisher", Uuid::new_v4());
        let pointer = publisher.to_pointer().unwrap();
        let mut row = book("T", None);
        row.set("publisher", FieldValue::Object(Box::new(publisher)));

        let mut query = Query::new("Book");
        query.equal_to("publisher", pointer);
        assert!(query.matches(&row, &NoRelations).unwrap());
    }
}
