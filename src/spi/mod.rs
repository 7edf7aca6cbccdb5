// Copyright 2025 Cowboy AI, LLC.

//! # Service Provider Interfaces
//!
//! Ports through which the runtime reaches its external collaborators:
//!
//! - **Entity Store**: versioned entity state with a prepare/commit contract
//! - **Identity Generator**: identities for new entities
//! - **Value Serialization**: text form of value composites
//! - **Metrics Provider**: counters and timers, no-op when absent
//! - **Entity Finder**: query execution for units of work
//!
//! Implementations are registered as imported services of the ports' types
//! (see `ModuleAssembly::import_port`) and reached through the lazily
//! initialized accessors of a module instance.

pub mod memory;
pub mod metrics;
pub mod query;

pub use memory::MemoryEntityStore;
pub use metrics::{
    DurationStats, InMemoryMetricsProvider, MetricsCounter, MetricsProvider, MetricsSummary,
    MetricsTimer, NoopMetricsProvider, TimerContext,
};
pub use query::{EntityFinder, QueryFilter, QuerySpecification, SortDirection};

use crate::errors::{EntityStoreError, RuntimeError};
use crate::types::TypeName;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identity of an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityReference(String);

impl EntityReference {
    /// Reference to the entity with `identity`
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// The identity string
    pub fn identity(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityReference {
    fn from(identity: &str) -> Self {
        Self::new(identity)
    }
}

impl From<String> for EntityReference {
    fn from(identity: String) -> Self {
        Self(identity)
    }
}

/// Lifecycle status of an entity within a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityStatus {
    /// Created in this unit of work
    New,
    /// Read from the store, unchanged
    Loaded,
    /// Read from the store and modified
    Updated,
    /// Marked for removal
    Removed,
}

/// State values keyed by state name
///
/// Properties hold their value; associations hold an identity string or
/// null; many-associations an array of identities; named associations an
/// object of identities.
pub type StateValues = IndexMap<String, Value>;

/// Versioned state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Entity identity
    pub reference: EntityReference,
    /// Store version the state was read at; zero for new entities
    pub version: u64,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
    /// Primary type of the entity model
    pub entity_type: TypeName,
    /// Status within the unit of work
    pub status: EntityStatus,
    /// State values
    pub state: StateValues,
}

impl EntityState {
    /// Fresh state for a new entity
    pub fn new(reference: EntityReference, entity_type: TypeName, state: StateValues) -> Self {
        Self {
            reference,
            version: 0,
            last_modified: Utc::now(),
            entity_type,
            status: EntityStatus::New,
            state,
        }
    }

    /// Value of a state slot
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.state.get(name)
    }
}

/// Applies or abandons changes accepted by [`EntityStore::prepare`]
pub trait StateCommitter {
    /// Make the changes durable
    fn commit(self: Box<Self>) -> Result<(), EntityStoreError>;

    /// Abandon the prepared changes
    fn cancel(self: Box<Self>);
}

/// Versioned entity state storage
pub trait EntityStore: Send + Sync {
    /// Current state of an entity
    fn entity_state(&self, reference: &EntityReference) -> Result<EntityState, EntityStoreError>;

    /// Validate a change set and return a committer for it
    ///
    /// Changed states carry the version they were read at; a mismatch with
    /// the stored version is a [`EntityStoreError::ConcurrentModification`].
    fn prepare(
        &self,
        new_states: Vec<EntityState>,
        changed_states: Vec<EntityState>,
        removed: Vec<EntityReference>,
    ) -> Result<Box<dyn StateCommitter>, EntityStoreError>;
}

/// Generates identities for new entities
pub trait IdentityGenerator: Send + Sync {
    /// A fresh identity for an entity of `entity_type`
    fn generate(&self, entity_type: &TypeName) -> String;
}

/// Random UUID identities
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdentityGenerator;

impl IdentityGenerator for UuidIdentityGenerator {
    fn generate(&self, _entity_type: &TypeName) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Text form of value composite state
pub trait ValueSerialization: Send + Sync {
    /// Serialize a state object
    fn serialize(&self, state: &Value) -> Result<String, RuntimeError>;

    /// Parse text produced by [`serialize`](Self::serialize) for `value_type`
    fn deserialize(&self, value_type: &TypeName, text: &str) -> Result<Value, RuntimeError>;
}

/// JSON value serialization
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerialization;

impl ValueSerialization for JsonSerialization {
    fn serialize(&self, state: &Value) -> Result<String, RuntimeError> {
        Ok(serde_json::to_string(state)?)
    }

    fn deserialize(&self, value_type: &TypeName, text: &str) -> Result<Value, RuntimeError> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(RuntimeError::Serialization(format!(
                "State of {value_type} must be a JSON object"
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uuid_identities_are_unique() {
        let generator = UuidIdentityGenerator;
        let a = generator.generate(&"Person".into());
        let b = generator.generate(&"Person".into());
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_json_serialization() {
        let serialization = JsonSerialization;
        let text = serialization.serialize(&json!({"street": "Main"})).unwrap();
        let value = serialization.deserialize(&"Address".into(), &text).unwrap();
        assert_eq!(value, json!({"street": "Main"}));

        let err = serialization.deserialize(&"Address".into(), "[1]").unwrap_err();
        assert!(err.to_string().contains("Address"));
    }

    #[test]
    fn test_entity_reference_serializes_as_string() {
        let reference = EntityReference::new("person-1");
        assert_eq!(serde_json::to_value(&reference).unwrap(), json!("person-1"));
        assert_eq!(reference.to_string(), "person-1");
    }
}
