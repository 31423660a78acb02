//! Reference entity repository (Publisher, Author, Genre, ISBD).
//!
//! # Responsibility
//! - Load the full set of each reference class as selectable choices.
//! - Create reference records from the object creation form.
//! - Map generic store records to `ReferenceEntity` handles.
//!
//! # Invariants
//! - One unfiltered query per class; results keep store order.
//! - A failing class never blocks loading of the remaining classes.
//! - A `ChoiceSnapshot` is fetched at most once per screen activation.

use crate::cancel::CancellationToken;
use crate::model::entity::{
    normalize_name, ReferenceClass, ReferenceEntity, ValidationError, NAME_FIELD,
};
use crate::store::{ObjectId, ObjectStore, Query, StoreError, StoreObject};
use log::{error, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for catalog reads and writes.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Store(StoreError),
    /// The owning screen was torn down before the next round-trip.
    Cancelled,
    /// Record exists but does not have the expected shape.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::InvalidData(message) => write!(f, "invalid catalog data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Cancelled => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Fails with `RepoError::Cancelled` once `token` is cancelled.
pub fn check_cancelled(token: &CancellationToken) -> RepoResult<()> {
    if token.is_cancelled() {
        return Err(RepoError::Cancelled);
    }
    Ok(())
}

/// One class that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceFailure {
    pub class: ReferenceClass,
    /// Store message, shown verbatim to the user.
    pub message: String,
}

/// Result of loading several reference classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceLoad {
    pub choices: BTreeMap<ReferenceClass, Vec<ReferenceEntity>>,
    pub failures: Vec<ChoiceFailure>,
}

impl ChoiceLoad {
    pub fn get(&self, class: ReferenceClass) -> Option<&[ReferenceEntity]> {
        self.choices.get(&class).map(Vec::as_slice)
    }
}

/// Repository over reference classes.
pub struct ReferenceRepository<S: ObjectStore> {
    store: S,
}

impl<S: ObjectStore> ReferenceRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads every record of `class`, in store order.
    pub fn list(
        &self,
        class: ReferenceClass,
        token: &CancellationToken,
    ) -> RepoResult<Vec<ReferenceEntity>> {
        check_cancelled(token)?;
        let rows = self.store.find(&Query::new(class.class_name()))?;
        rows.iter()
            .map(|row| reference_from_object(class, row))
            .collect()
    }

    /// Loads `classes` one after another.
    ///
    /// Store failures are recorded per class and loading continues;
    /// only cancellation aborts the whole load.
    pub fn load_choices(
        &self,
        classes: &[ReferenceClass],
        token: &CancellationToken,
    ) -> RepoResult<ChoiceLoad> {
        let mut load = ChoiceLoad::default();
        for class in classes {
            match self.list(*class, token) {
                Ok(entities) => {
                    info!(
                        "event=choices_load module=repo status=ok class={} count={}",
                        class,
                        entities.len()
                    );
                    load.choices.insert(*class, entities);
                }
                Err(RepoError::Cancelled) => return Err(RepoError::Cancelled),
                Err(err) => {
                    error!(
                        "event=choices_load module=repo status=error class={} error={}",
                        class, err
                    );
                    load.failures.push(ChoiceFailure {
                        class: *class,
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(load)
    }

    /// Resolves an id received from the UI to a handle of `class`.
    pub fn find_by_id(
        &self,
        class: ReferenceClass,
        id: ObjectId,
        token: &CancellationToken,
    ) -> RepoResult<Option<ReferenceEntity>> {
        check_cancelled(token)?;
        let mut query = Query::new(class.class_name());
        query.with_object_id(id);
        self.store
            .first(&query)?
            .map(|row| reference_from_object(class, &row))
            .transpose()
    }

    /// Saves a new `{name}` record of `class`.
    pub fn create(
        &self,
        class: ReferenceClass,
        name: &str,
        token: &CancellationToken,
    ) -> RepoResult<ReferenceEntity> {
        let name = normalize_name(class, name)?;
        check_cancelled(token)?;

        let mut object = StoreObject::new(class.class_name());
        object.set(NAME_FIELD, name.as_str());
        let saved = self.store.save(&object)?;
        let entity = reference_from_object(class, &saved)?;
        info!(
            "event=reference_create module=repo status=ok class={} object_id={}",
            class, entity.id
        );
        Ok(entity)
    }
}

/// Per-screen cache of loaded choices.
///
/// Mirrors the "load once while every slot is empty" guard of catalog screens.
#[derive(Debug, Clone)]
pub struct ChoiceSnapshot {
    classes: Vec<ReferenceClass>,
    slots: BTreeMap<ReferenceClass, Vec<ReferenceEntity>>,
}

impl ChoiceSnapshot {
    pub fn new(classes: &[ReferenceClass]) -> Self {
        Self {
            classes: classes.to_vec(),
            slots: BTreeMap::new(),
        }
    }

    /// Classes this snapshot loads, in load order.
    pub fn classes(&self) -> &[ReferenceClass] {
        &self.classes
    }

    /// Whether no class has been loaded yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fetches choices unless any slot already holds a value.
    ///
    /// Returns the failures of this fetch; empty when nothing was fetched.
    pub fn ensure_loaded<S: ObjectStore>(
        &mut self,
        repo: &ReferenceRepository<S>,
        token: &CancellationToken,
    ) -> RepoResult<Vec<ChoiceFailure>> {
        if !self.is_empty() {
            return Ok(Vec::new());
        }

        let load = repo.load_choices(&self.classes, token)?;
        self.slots = load.choices;
        Ok(load.failures)
    }

    /// Loaded choices for `class`; `None` when never loaded or failed.
    pub fn get(&self, class: ReferenceClass) -> Option<&[ReferenceEntity]> {
        self.slots.get(&class).map(Vec::as_slice)
    }
}

/// Maps a store record of `class` to a typed handle.
pub(crate) fn reference_from_object(
    class: ReferenceClass,
    object: &StoreObject,
) -> RepoResult<ReferenceEntity> {
    if object.class_name != class.class_name() {
        return Err(RepoError::InvalidData(format!(
            "expected a {} record, got `{}`",
            class, object.class_name
        )));
    }
    let id = object.id.ok_or_else(|| {
        RepoError::InvalidData(format!("{class} record returned without an id"))
    })?;
    let name = object.text(NAME_FIELD).ok_or_else(|| {
        RepoError::InvalidData(format!("{class} record `{id}` has no text `name`"))
    })?;
    Ok(ReferenceEntity::new(id, class, name))
}

#[cfg(test)]
mod tests {
    use super::{reference_from_object, RepoError};
    use crate::model::entity::ReferenceClass;
    use crate::store::StoreObject;
    use uuid::Uuid;

    #[test]
    fn mapping_rejects_records_without_name() {
        let object = StoreObject::with_id("Genre", Uuid::new_v4());
        let err = reference_from_object(ReferenceClass::Genre, &object).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }

    #[test]
    fn mapping_rejects_mismatched_class() {
        let mut object = StoreObject::with_id("Author", Uuid::new_v4());
        object.set("name", "Ann");
        let err = reference_from_object(ReferenceClass::Publisher, &object).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }
}
