// Copyright 2025 Cowboy AI, LLC.

//! State slots derived from accessors and mixin fields

use super::ValueConstraintsModel;
use crate::errors::ConstraintViolationError;
use crate::types::{StateKind, TypeName, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Declaring type plus member name, rendered `Type:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Declaring type
    pub type_name: TypeName,
    /// Member name
    pub name: String,
}

impl QualifiedName {
    /// Create a qualified name
    pub fn new(type_name: impl Into<TypeName>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.name)
    }
}

/// How the initial value of a slot is computed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DefaultValuePolicy {
    /// Starts as null
    Null,
    /// Starts as the value type's default
    UseDefaults,
    /// Starts as the declared value
    Initial(Value),
}

impl DefaultValuePolicy {
    /// Initial value for a slot of `value_type`
    pub fn initial_value(&self, value_type: &ValueType) -> Value {
        match self {
            DefaultValuePolicy::Null => Value::Null,
            DefaultValuePolicy::UseDefaults => value_type.default_value(),
            DefaultValuePolicy::Initial(value) => value.clone(),
        }
    }
}

/// Module-level declaration refining a state slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDeclaration {
    /// Explicit initial value
    pub initial_value: Option<Value>,
    /// Start from the value type's default
    pub use_defaults: bool,
    /// Cannot change after the instance is built
    pub immutable: bool,
    /// Accepts null
    pub optional: bool,
}

/// State declarations of a module, keyed by `Type:name` or plain `name`
#[derive(Debug, Clone, Default)]
pub struct StateDeclarations {
    declarations: IndexMap<String, StateDeclaration>,
}

impl StateDeclarations {
    /// Declare for an accessor name or qualified name
    pub fn declare(&mut self, name: impl Into<String>, declaration: StateDeclaration) {
        self.declarations.insert(name.into(), declaration);
    }

    /// Declaration for a slot; the qualified form takes precedence
    pub fn get(&self, name: &QualifiedName) -> Option<&StateDeclaration> {
        self.declarations
            .get(&name.to_string())
            .or_else(|| self.declarations.get(&name.name))
    }
}

/// A single state slot of a composite
#[derive(Debug, Clone)]
pub struct StateDescriptor {
    pub(crate) qualified_name: QualifiedName,
    pub(crate) kind: StateKind,
    pub(crate) value_type: ValueType,
    pub(crate) immutable: bool,
    pub(crate) default: DefaultValuePolicy,
    pub(crate) constraints: ValueConstraintsModel,
}

impl StateDescriptor {
    /// Qualified name of the first registering accessor
    pub fn qualified_name(&self) -> &QualifiedName {
        &self.qualified_name
    }

    /// State name
    pub fn name(&self) -> &str {
        &self.qualified_name.name
    }

    /// Property or association kind
    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// Value type
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Whether null is accepted
    pub fn is_optional(&self) -> bool {
        self.constraints.is_optional()
    }

    /// Whether the slot is frozen once the instance is built
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Initial value policy
    pub fn default_value(&self) -> &DefaultValuePolicy {
        &self.default
    }

    /// Initial value
    pub fn initial_value(&self) -> Value {
        self.default.initial_value(&self.value_type)
    }

    /// Constraints
    pub fn constraints(&self) -> &ValueConstraintsModel {
        &self.constraints
    }

    /// Validate a value for this slot
    pub fn check(&self, composite: &TypeName, value: &Value) -> Result<(), ConstraintViolationError> {
        let violations = self.constraints.check(value);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConstraintViolationError {
                composite: composite.clone(),
                member: self.name().to_string(),
                violations,
            })
        }
    }
}

/// All state slots of a composite, one per state name
#[derive(Debug, Clone, Default)]
pub struct StateModel {
    slots: IndexMap<String, StateDescriptor>,
}

impl StateModel {
    /// Register a slot unless one with the same name exists
    ///
    /// First registration wins. Two unrelated interfaces declaring an
    /// accessor with the same name therefore share one slot.
    pub(crate) fn register(&mut self, descriptor: StateDescriptor) -> bool {
        let name = descriptor.name().to_string();
        if self.slots.contains_key(&name) {
            return false;
        }
        self.slots.insert(name, descriptor);
        true
    }

    /// Slot by name
    pub fn get(&self, name: &str) -> Option<&StateDescriptor> {
        self.slots.get(name)
    }

    /// Slots in registration order
    pub fn iter(&self) -> impl Iterator<Item = &StateDescriptor> {
        self.slots.values()
    }

    /// Slots of one kind
    pub fn of_kind(&self, kind: StateKind) -> impl Iterator<Item = &StateDescriptor> {
        self.slots.values().filter(move |s| s.kind == kind)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if there are no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
