//! Read-before-write uniqueness guard.
//!
//! # Invariants
//! - The check is one equality query for the first matching record.
//! - The check is not atomic with the create that follows it; concurrent
//!   creators can still both pass.

use crate::cancel::CancellationToken;
use crate::repo::reference_repo::{check_cancelled, RepoResult};
use crate::store::{FieldValue, ObjectStore, Query, StoreObject};
use log::debug;

/// Returns the existing record whose `field` equals `value`, if any.
///
/// `Some` means the dependent create must be refused with a conflict.
pub fn ensure_unique<S: ObjectStore>(
    store: &S,
    class_name: &str,
    field: &str,
    value: impl Into<FieldValue>,
    token: &CancellationToken,
) -> RepoResult<Option<StoreObject>> {
    check_cancelled(token)?;
    let mut query = Query::new(class_name);
    query.equal_to(field, value);
    let existing = store.first(&query)?;
    debug!(
        "event=uniqueness_check module=repo class={} field={} taken={}",
        class_name,
        field,
        existing.is_some()
    );
    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::ensure_unique;
    use crate::cancel::CancellationToken;
    use crate::repo::reference_repo::RepoError;
    use crate::store::{InMemoryStore, ObjectStore, StoreObject};

    #[test]
    fn finds_existing_value_and_ignores_other_values() {
        let store = InMemoryStore::new();
        let mut isbd = StoreObject::new("ISBD");
        isbd.set("name", "X");
        store.save(&isbd).unwrap();
        let token = CancellationToken::new();

        assert!(ensure_unique(&store, "ISBD", "name", "X", &token)
            .unwrap()
            .is_some());
        assert!(ensure_unique(&store, "ISBD", "name", "Y", &token)
            .unwrap()
            .is_none());
    }

    #[test]
    fn cancelled_token_skips_the_query() {
        let store = InMemoryStore::new();
        store.fail_queries("ISBD", "must not be queried");
        let token = CancellationToken::new();
        token.cancel();

        let err = ensure_unique(&store, "ISBD", "name", "X", &token).unwrap_err();
        assert!(matches!(err, RepoError::Cancelled));
    }
}
