// Copyright 2025 Cowboy AI, LLC.

//! In-memory entity store with optimistic versioning

use super::{
    EntityFinder, EntityReference, EntityState, EntityStatus, EntityStore, QuerySpecification,
    StateCommitter,
};
use crate::errors::EntityStoreError;
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

type States = IndexMap<EntityReference, EntityState>;

/// Entity store keeping every state in a shared map
///
/// Each commit stores states at their read version plus one. Clones share
/// the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryEntityStore {
    states: Arc<RwLock<States>>,
}

impl MemoryEntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a state as-is, replacing any existing one
    pub fn insert(&self, mut state: EntityState) {
        state.status = EntityStatus::Loaded;
        self.states.write().insert(state.reference.clone(), state);
    }

    /// Whether state exists for the reference
    pub fn contains(&self, reference: &EntityReference) -> bool {
        self.states.read().contains_key(reference)
    }

    /// Stored version of an entity
    pub fn version(&self, reference: &EntityReference) -> Option<u64> {
        self.states.read().get(reference).map(|s| s.version)
    }

    /// Number of stored entities
    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

fn check(
    states: &States,
    new_states: &[EntityState],
    changed_states: &[EntityState],
) -> Result<(), EntityStoreError> {
    for state in new_states {
        if states.contains_key(&state.reference) {
            return Err(EntityStoreError::AlreadyExists(state.reference.clone()));
        }
    }
    let conflicts: Vec<EntityReference> = changed_states
        .iter()
        .filter(|state| {
            states
                .get(&state.reference)
                .map_or(true, |stored| stored.version != state.version)
        })
        .map(|state| state.reference.clone())
        .collect();
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(EntityStoreError::ConcurrentModification(conflicts))
    }
}

impl EntityStore for MemoryEntityStore {
    fn entity_state(&self, reference: &EntityReference) -> Result<EntityState, EntityStoreError> {
        self.states
            .read()
            .get(reference)
            .cloned()
            .map(|mut state| {
                state.status = EntityStatus::Loaded;
                state
            })
            .ok_or_else(|| EntityStoreError::NotFound(reference.clone()))
    }

    fn prepare(
        &self,
        new_states: Vec<EntityState>,
        changed_states: Vec<EntityState>,
        removed: Vec<EntityReference>,
    ) -> Result<Box<dyn StateCommitter>, EntityStoreError> {
        check(&self.states.read(), &new_states, &changed_states)?;
        Ok(Box::new(MemoryCommitter {
            states: self.states.clone(),
            new_states,
            changed_states,
            removed,
        }))
    }
}

struct MemoryCommitter {
    states: Arc<RwLock<States>>,
    new_states: Vec<EntityState>,
    changed_states: Vec<EntityState>,
    removed: Vec<EntityReference>,
}

impl StateCommitter for MemoryCommitter {
    fn commit(self: Box<Self>) -> Result<(), EntityStoreError> {
        let mut states = self.states.write();
        // another committer may have run since prepare
        check(&states, &self.new_states, &self.changed_states)?;

        let now = Utc::now();
        let (created, updated, removed) = (
            self.new_states.len(),
            self.changed_states.len(),
            self.removed.len(),
        );
        for mut state in self.new_states.into_iter().chain(self.changed_states) {
            state.version += 1;
            state.last_modified = now;
            state.status = EntityStatus::Loaded;
            states.insert(state.reference.clone(), state);
        }
        for reference in &self.removed {
            states.shift_remove(reference);
        }
        debug!(created, updated, removed, "memory entity store committed");
        Ok(())
    }

    fn cancel(self: Box<Self>) {}
}

impl EntityFinder for MemoryEntityStore {
    fn find_entities(
        &self,
        query: &QuerySpecification,
    ) -> Result<Vec<EntityReference>, EntityStoreError> {
        let states = self.states.read();
        let matching: Vec<&EntityState> = states.values().filter(|s| query.matches(s)).collect();
        Ok(query
            .window(matching)
            .into_iter()
            .map(|s| s.reference.clone())
            .collect())
    }
}
