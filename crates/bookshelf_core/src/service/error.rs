//! Service-level error for catalog use-cases.
//!
//! # Invariants
//! - Store messages are carried verbatim so screens can show them as-is.
//! - `OrphanedIsbd` is only produced after an ISBD record was saved and the
//!   dependent book write did not complete.

use crate::model::entity::ValidationError;
use crate::repo::reference_repo::RepoError;
use crate::store::{ObjectId, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for reference and book use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected before any store write.
    Validation(ValidationError),
    /// An ISBD record with the same text already exists.
    Conflict { isbd: String },
    /// Transport or store failure.
    Store(StoreError),
    /// ISBD record `isbd_id` was saved but the book write did not complete.
    OrphanedIsbd {
        isbd_id: ObjectId,
        cause: Box<ServiceError>,
    },
    /// The owning screen was torn down before the next round-trip.
    Cancelled,
    /// Store returned a record that cannot be mapped.
    InvalidData(String),
}

impl ServiceError {
    /// Stable machine-readable code used by FFI envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict { .. } => "conflict",
            Self::Store(_) => "store",
            Self::OrphanedIsbd { .. } => "orphaned_isbd",
            Self::Cancelled => "cancelled",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict { isbd } => write!(f, "ISBD `{isbd}` already exists"),
            Self::Store(err) => write!(f, "{err}"),
            Self::OrphanedIsbd { isbd_id, cause } => {
                write!(f, "{cause} (ISBD record {isbd_id} has no book)")
            }
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::InvalidData(message) => write!(f, "invalid catalog data: {message}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::OrphanedIsbd { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Store(err) => Self::Store(err),
            RepoError::Cancelled => Self::Cancelled,
            RepoError::InvalidData(message) => Self::InvalidData(message),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::repo::reference_repo::RepoError;
    use crate::store::StoreError;
    use uuid::Uuid;

    #[test]
    fn repo_errors_map_onto_service_variants() {
        assert!(matches!(
            ServiceError::from(RepoError::Cancelled),
            ServiceError::Cancelled
        ));
        let err = ServiceError::from(RepoError::Store(StoreError::Unavailable(
            "offline".to_string(),
        )));
        assert_eq!(err.code(), "store");
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn orphan_message_keeps_the_cause_text() {
        let isbd_id = Uuid::new_v4();
        let err = ServiceError::OrphanedIsbd {
            isbd_id,
            cause: Box::new(ServiceError::Store(StoreError::Unavailable(
                "timeout".to_string(),
            ))),
        };
        let message = err.to_string();
        assert!(message.contains("timeout"));
        assert!(message.contains(&isbd_id.to_string()));
    }
}
