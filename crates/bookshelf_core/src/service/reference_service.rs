//! Reference data use-case service.
//!
//! # Responsibility
//! - Load choice lists for catalog screens.
//! - Create reference records from the object creation form.
//! - Resolve ids received from the UI back into typed handles.
//!
//! # Invariants
//! - Under `IsbdPolicy::Unique`, ISBD records are created only after the
//!   uniqueness guard finds no record with the same text.
//! - An empty id string means "no selection", never an error.

use crate::cancel::CancellationToken;
use crate::config::{CatalogConfig, IsbdPolicy};
use crate::model::entity::{
    normalize_name, ReferenceClass, ReferenceEntity, ValidationError, NAME_FIELD,
};
use crate::repo::reference_repo::{ChoiceLoad, ReferenceRepository};
use crate::repo::uniqueness::ensure_unique;
use crate::service::error::ServiceError;
use crate::store::{ObjectId, ObjectStore};
use log::warn;

/// Reference service facade over an object store.
pub struct ReferenceService<S: ObjectStore> {
    repo: ReferenceRepository<S>,
    config: CatalogConfig,
}

impl<S: ObjectStore> ReferenceService<S> {
    pub fn new(store: S, config: CatalogConfig) -> Self {
        Self {
            repo: ReferenceRepository::new(store),
            config,
        }
    }

    /// Underlying repository, for screen-scoped caches.
    pub fn repository(&self) -> &ReferenceRepository<S> {
        &self.repo
    }

    /// Loads each class in `classes`; per-class failures are reported, not raised.
    pub fn load_choices(
        &self,
        classes: &[ReferenceClass],
        token: &CancellationToken,
    ) -> Result<ChoiceLoad, ServiceError> {
        Ok(self.repo.load_choices(classes, token)?)
    }

    /// Creates one `{name}` record of `class`.
    pub fn create_reference(
        &self,
        class: ReferenceClass,
        name: &str,
        token: &CancellationToken,
    ) -> Result<ReferenceEntity, ServiceError> {
        let name = normalize_name(class, name)?;
        if class == ReferenceClass::Isbd && self.config.isbd_policy == IsbdPolicy::Unique {
            let existing = ensure_unique(
                self.repo.store(),
                class.class_name(),
                NAME_FIELD,
                name.as_str(),
                token,
            )?;
            if existing.is_some() {
                warn!(
                    "event=reference_create module=service status=conflict class={}",
                    class
                );
                return Err(ServiceError::Conflict { isbd: name });
            }
        }
        Ok(self.repo.create(class, &name, token)?)
    }

    /// Creates a record from navigation parameters (class name as text).
    pub fn create_reference_named(
        &self,
        class_name: &str,
        name: &str,
        token: &CancellationToken,
    ) -> Result<ReferenceEntity, ServiceError> {
        let class = ReferenceClass::parse(class_name)
            .ok_or_else(|| ValidationError::UnknownClass(class_name.to_string()))?;
        self.create_reference(class, name, token)
    }

    /// Resolves a selected id to a handle of `class`.
    ///
    /// Empty text means nothing is selected and yields `None`.
    pub fn resolve_selection(
        &self,
        class: ReferenceClass,
        id_text: &str,
        token: &CancellationToken,
    ) -> Result<Option<ReferenceEntity>, ServiceError> {
        let trimmed = id_text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let id = parse_object_id(trimmed)?;
        match self.repo.find_by_id(class, id, token)? {
            Some(entity) => Ok(Some(entity)),
            None => Err(ValidationError::StaleSelection {
                class,
                id: trimmed.to_string(),
            }
            .into()),
        }
    }

    /// Resolves every id in `ids`, keeping order and dropping empty entries.
    pub fn resolve_selections(
        &self,
        class: ReferenceClass,
        ids: &[String],
        token: &CancellationToken,
    ) -> Result<Vec<ReferenceEntity>, ServiceError> {
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.resolve_selection(class, id, token)? {
                resolved.push(entity);
            }
        }
        Ok(resolved)
    }
}

fn parse_object_id(value: &str) -> Result<ObjectId, ValidationError> {
    ObjectId::parse_str(value).map_err(|_| ValidationError::InvalidId(value.to_string()))
}
