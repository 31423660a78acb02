//! Screen-scoped session state.
//!
//! # Responsibility
//! - Own the cancellation token of one screen activation.
//! - Cache the reference choices that screen loaded.
//!
//! # Invariants
//! - Dropping (or closing) a session cancels its token, so later
//!   round-trips of operations started from it never run.
//! - Choices are fetched at most once per session.

use crate::cancel::CancellationToken;
use crate::model::entity::{ReferenceClass, ReferenceEntity};
use crate::repo::reference_repo::{ChoiceFailure, ChoiceSnapshot};
use crate::service::error::ServiceError;
use crate::service::reference_service::ReferenceService;
use crate::store::ObjectStore;

/// One activation of a catalog screen.
pub struct ScreenSession {
    token: CancellationToken,
    choices: ChoiceSnapshot,
}

impl ScreenSession {
    pub fn new(classes: &[ReferenceClass]) -> Self {
        Self {
            token: CancellationToken::new(),
            choices: ChoiceSnapshot::new(classes),
        }
    }

    /// Session for the book creation form (Publisher, Author, Genre).
    pub fn book_form() -> Self {
        Self::new(&ReferenceClass::BOOK_FORM)
    }

    /// Session for the book list filters (Publisher, Author, Genre, ISBD).
    pub fn book_list() -> Self {
        Self::new(&ReferenceClass::BOOK_LIST)
    }

    /// Token to pass to every operation started from this screen.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn choices(&self) -> &ChoiceSnapshot {
        &self.choices
    }

    pub fn choices_for(&self, class: ReferenceClass) -> Option<&[ReferenceEntity]> {
        self.choices.get(class)
    }

    /// Loads choices on first activation; later calls are no-ops.
    pub fn ensure_choices<S: ObjectStore>(
        &mut self,
        service: &ReferenceService<S>,
    ) -> Result<Vec<ChoiceFailure>, ServiceError> {
        Ok(self
            .choices
            .ensure_loaded(service.repository(), &self.token)?)
    }

    /// Tears the screen down explicitly.
    pub fn close(self) {}
}

impl Drop for ScreenSession {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
