// Copyright 2025 Cowboy AI, LLC.

use super::UnitOfWork;
use crate::errors::{InvocationError, UnitOfWorkError};
use crate::runtime::{initial_state, validate_state, CompositeInstance};
use crate::spi::{EntityReference, EntityState, StateValues};
use crate::structure::CompositeDescriptor;
use serde_json::Value;
use std::sync::Arc;

/// Builds a new entity inside a unit of work
///
/// The identity is generated by the visible identity generator unless one
/// was given. State is validated when the instance is created.
#[derive(Debug)]
pub struct EntityBuilder {
    unit_of_work: UnitOfWork,
    descriptor: Arc<CompositeDescriptor>,
    identity: Option<String>,
    state: StateValues,
}

impl EntityBuilder {
    pub(crate) fn new(
        unit_of_work: UnitOfWork,
        descriptor: Arc<CompositeDescriptor>,
        identity: Option<String>,
    ) -> Self {
        let state = initial_state(descriptor.model());
        Self {
            unit_of_work,
            descriptor,
            identity,
            state,
        }
    }

    /// Set a prototype state value
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self, InvocationError> {
        match self.state.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                Ok(self)
            }
            None => Err(InvocationError::NoSuchState {
                composite: self.descriptor.primary_type().clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Current prototype state
    pub fn prototype(&self) -> &StateValues {
        &self.state
    }

    /// Identity given to the builder, if any
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Validate the prototype and attach the entity to the unit of work
    pub fn new_instance(&self) -> Result<CompositeInstance, UnitOfWorkError> {
        self.unit_of_work.check_open()?;
        validate_state(self.descriptor.model(), &self.state)?;
        let identity = match &self.identity {
            Some(identity) => identity.clone(),
            None => self
                .unit_of_work
                .module()
                .identity_generator()?
                .generate(self.descriptor.primary_type()),
        };
        let state = EntityState::new(
            EntityReference::new(identity),
            self.descriptor.primary_type().clone(),
            self.state.clone(),
        );
        self.unit_of_work.attach_new(self.descriptor.clone(), state)
    }
}
