// Copyright 2025 Cowboy AI, LLC.

//! Builders for transient and value composites

use super::composite::{initial_state, validate_state, CompositeInstance, StateBinding};
use super::injection::Uses;
use crate::errors::{InvocationError, RuntimeError};
use crate::spi::StateValues;
use crate::structure::{CompositeDescriptor, Module};
use std::any::Any;
use std::sync::Arc;

/// Prototype state shared by the builders
#[derive(Debug, Clone)]
struct Prototype {
    descriptor: Arc<CompositeDescriptor>,
    state: StateValues,
}

impl Prototype {
    fn new(descriptor: Arc<CompositeDescriptor>) -> Self {
        let state = initial_state(descriptor.model());
        Self { descriptor, state }
    }

    fn set(&mut self, name: &str, value: serde_json::Value) -> Result<(), InvocationError> {
        match self.state.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(InvocationError::NoSuchState {
                composite: self.descriptor.primary_type().clone(),
                name: name.to_string(),
            }),
        }
    }

    fn instantiate(&self, module: &Module, uses: Uses) -> Result<CompositeInstance, RuntimeError> {
        validate_state(self.descriptor.model(), &self.state)?;
        CompositeInstance::create(
            self.descriptor.clone(),
            module,
            StateBinding::local(self.state.clone()),
            uses,
        )
    }
}

/// Builds transient composites
///
/// State starts from each slot's initial value. Constraints are checked
/// when [`new_instance`](Self::new_instance) is called, not when values are set.
#[derive(Debug)]
pub struct TransientBuilder {
    module: Module,
    prototype: Prototype,
    uses: Uses,
}

impl TransientBuilder {
    pub(crate) fn new(module: Module, descriptor: Arc<CompositeDescriptor>) -> Self {
        Self {
            module,
            prototype: Prototype::new(descriptor),
            uses: Uses::new(),
        }
    }

    /// Set a prototype state value
    pub fn set(&mut self, name: &str, value: impl Into<serde_json::Value>) -> Result<&mut Self, InvocationError> {
        self.prototype.set(name, value.into())?;
        Ok(self)
    }

    /// Supply a value for uses-dependencies of `type_name`
    pub fn use_value<T: Any + Send + Sync>(&mut self, type_name: &str, value: T) -> &mut Self {
        self.uses.insert(type_name, value);
        self
    }

    /// Supply several uses values at once
    pub fn uses(&mut self, uses: &Uses) -> &mut Self {
        self.uses.merge(uses);
        self
    }

    /// Current prototype state
    pub fn prototype(&self) -> &StateValues {
        &self.prototype.state
    }

    /// Validate the prototype and create an instance; the builder stays usable
    pub fn new_instance(&self) -> Result<CompositeInstance, RuntimeError> {
        self.prototype.instantiate(&self.module, self.uses.clone())
    }
}

/// Builds value composites
///
/// Values are immutable once built; all state is given to the builder.
#[derive(Debug)]
pub struct ValueBuilder {
    module: Module,
    prototype: Prototype,
}

impl ValueBuilder {
    pub(crate) fn new(module: Module, descriptor: Arc<CompositeDescriptor>) -> Self {
        Self {
            module,
            prototype: Prototype::new(descriptor),
        }
    }

    /// Set a prototype state value
    pub fn set(&mut self, name: &str, value: impl Into<serde_json::Value>) -> Result<&mut Self, InvocationError> {
        self.prototype.set(name, value.into())?;
        Ok(self)
    }

    /// Take every state value present in a JSON object; unknown keys are ignored
    pub(crate) fn set_all(&mut self, state: &serde_json::Map<String, serde_json::Value>) {
        for (name, value) in state {
            if let Some(slot) = self.prototype.state.get_mut(name) {
                *slot = value.clone();
            }
        }
    }

    /// Current prototype state
    pub fn prototype(&self) -> &StateValues {
        &self.prototype.state
    }

    /// Validate the prototype and create the value
    pub fn new_instance(&self) -> Result<CompositeInstance, RuntimeError> {
        self.prototype.instantiate(&self.module, Uses::new())
    }
}
