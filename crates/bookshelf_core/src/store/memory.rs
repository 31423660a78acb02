//! In-memory object store.
//!
//! # Responsibility
//! - Provide a process-local `ObjectStore` for tests and throwaway catalogs.
//! - Simulate backend failures per class for error-path coverage.
//!
//! # Invariants
//! - Records keep insertion order.
//! - Injected failures reject the call before any state change.
//! - `write_count` counts successful saves only.

use crate::store::object::{ObjectId, Pointer, StoreObject};
use crate::store::query::{Query, RelationIndex};
use crate::store::{ObjectStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    objects: Vec<StoreObject>,
    relations: BTreeMap<(ObjectId, String), Vec<Pointer>>,
    query_failures: BTreeMap<String, String>,
    save_failures: BTreeMap<String, String>,
    writes: usize,
}

impl MemoryState {
    fn load(&self, pointer: &Pointer) -> Option<StoreObject> {
        self.objects
            .iter()
            .find(|object| {
                object.id == Some(pointer.object_id) && object.class_name == pointer.class_name
            })
            .cloned()
    }
}

impl RelationIndex for MemoryState {
    fn members(&self, owner_id: ObjectId, key: &str) -> StoreResult<Vec<Pointer>> {
        Ok(self
            .relations
            .get(&(owner_id, key.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Mutex-guarded in-memory implementation of `ObjectStore`.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later query on `class_name` fail with `message`.
    pub fn fail_queries(&self, class_name: &str, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state
                .query_failures
                .insert(class_name.to_string(), message.to_string());
        }
    }

    /// Makes every later save of a `class_name` record fail with `message`.
    pub fn fail_saves(&self, class_name: &str, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state
                .save_failures
                .insert(class_name.to_string(), message.to_string());
        }
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.query_failures.clear();
            state.save_failures.clear();
        }
    }

    /// Number of successful saves since construction.
    pub fn write_count(&self) -> usize {
        self.state.lock().map_or(0, |state| state.writes)
    }

    /// Number of stored records of `class_name`.
    pub fn object_count(&self, class_name: &str) -> usize {
        self.state.lock().map_or(0, |state| {
            state
                .objects
                .iter()
                .filter(|object| object.class_name == class_name)
                .count()
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

impl ObjectStore for InMemoryStore {
    fn find(&self, query: &Query) -> StoreResult<Vec<StoreObject>> {
        let state = self.lock()?;
        if let Some(message) = state.query_failures.get(query.class_name()) {
            return Err(StoreError::Unavailable(message.clone()));
        }

        let mut results = Vec::new();
        for object in &state.objects {
            if query.matches(object, &*state)? {
                results.push(object.clone());
            }
        }
        query.order_and_limit(&mut results);
        query.expand_includes(&mut results, |pointer| Ok(state.load(pointer)))?;
        Ok(results)
    }

    fn save(&self, object: &StoreObject) -> StoreResult<StoreObject> {
        let mut state = self.lock()?;
        if let Some(message) = state.save_failures.get(object.class_name.as_str()) {
            return Err(StoreError::Unavailable(message.clone()));
        }

        let owner_id = object.id.unwrap_or_else(Uuid::new_v4);
        let saved = object.saved_as(owner_id);
        if object.id.is_none() {
            state.objects.push(saved.clone());
        } else {
            let slot = state
                .objects
                .iter_mut()
                .find(|current| current.id == Some(owner_id))
                .ok_or(StoreError::NotFound(owner_id))?;
            *slot = saved.clone();
        }

        for (key, targets) in object.pending_relations() {
            let members = state
                .relations
                .entry((owner_id, key.clone()))
                .or_default();
            for target in targets {
                if !members.contains(target) {
                    members.push(target.clone());
                }
            }
        }

        state.writes += 1;
        Ok(saved)
    }
}
