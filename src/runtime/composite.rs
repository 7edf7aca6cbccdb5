// Copyright 2025 Cowboy AI, LLC.

//! Composite instances: mixins, lazily built method chains and state

use super::injection::{InjectionContext, Uses};
use super::invocation::{Invocation, InvocationPhase, Next, PhaseTracker};
use crate::errors::{ConstraintViolationError, InvocationError, InvocationResult, RuntimeError};
use crate::fragment::{Concern, FragmentFactory, Mixin, SideEffect};
use crate::model::{CompositeMethodModel, CompositeModel, FragmentModel};
use crate::spi::{EntityReference, EntityState, EntityStatus, StateValues};
use crate::structure::{CompositeDescriptor, LazyHandle, Module, ModuleRef};
use crate::types::{StateKind, TypeName, TypeUniverse};
use anyhow::anyhow;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::warn;

/// Initial values of every state slot of a model
pub(crate) fn initial_state(model: &CompositeModel) -> StateValues {
    model
        .state()
        .iter()
        .map(|slot| (slot.name().to_string(), slot.initial_value()))
        .collect()
}

/// Validate every state slot; absent values count as null
pub(crate) fn validate_state(model: &CompositeModel, state: &StateValues) -> Result<(), ConstraintViolationError> {
    for slot in model.state().iter() {
        let value = state.get(slot.name()).unwrap_or(&Value::Null);
        slot.check(model.primary_type(), value)?;
    }
    Ok(())
}

/// Where the state of an instance lives
pub(crate) enum StateBinding {
    /// Held by the instance itself
    Local(RwLock<StateValues>),
    /// Shared with the unit of work tracking the entity
    Entity(Arc<RwLock<EntityState>>),
}

impl StateBinding {
    pub(crate) fn local(state: StateValues) -> Self {
        StateBinding::Local(RwLock::new(state))
    }

    fn read<R>(&self, f: impl FnOnce(&StateValues) -> R) -> R {
        match self {
            StateBinding::Local(state) => f(&state.read()),
            StateBinding::Entity(entity) => f(&entity.read().state),
        }
    }

    fn write<R>(&self, f: impl FnOnce(&mut StateValues) -> R) -> R {
        match self {
            StateBinding::Local(state) => f(&mut state.write()),
            StateBinding::Entity(entity) => {
                let mut entity = entity.write();
                let result = f(&mut entity.state);
                if entity.status == EntityStatus::Loaded {
                    entity.status = EntityStatus::Updated;
                }
                result
            }
        }
    }
}

/// Concern and side-effect instances of one method, built on first call
struct MethodInstance {
    concerns: Vec<Box<dyn Concern>>,
    side_effects: Vec<Box<dyn SideEffect>>,
}

struct CompositeInner {
    descriptor: Arc<CompositeDescriptor>,
    universe: Arc<TypeUniverse>,
    module: ModuleRef,
    mixins: OnceLock<Vec<Box<dyn Mixin>>>,
    methods: Vec<LazyHandle<MethodInstance>>,
    state: StateBinding,
    uses: Uses,
}

/// A live composite
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct CompositeInstance {
    inner: Arc<CompositeInner>,
}

impl CompositeInstance {
    pub(crate) fn create(
        descriptor: Arc<CompositeDescriptor>,
        module: &Module,
        state: StateBinding,
        uses: Uses,
    ) -> Result<Self, RuntimeError> {
        let methods = (0..descriptor.model().method_count())
            .map(|_| LazyHandle::new())
            .collect();
        let instance = Self {
            inner: Arc::new(CompositeInner {
                universe: module.application_model().universe().clone(),
                descriptor,
                module: module.downgrade(),
                mixins: OnceLock::new(),
                methods,
                state,
                uses,
            }),
        };

        let model = instance.inner.descriptor.model();
        let mut mixins = Vec::with_capacity(model.mixins().len());
        for mixin in model.mixins() {
            instance.inner.uses.check(mixin.name(), mixin.dependencies())?;
            let context = InjectionContext::new(
                module,
                Some(&instance),
                mixin.dependencies(),
                &instance.inner.uses,
                mixin.name(),
            );
            let created = match mixin.class().factory() {
                FragmentFactory::Mixin(factory) => factory(&context),
                other => Err(anyhow!("{} is a {}", mixin.name(), other.kind().as_str())),
            };
            mixins.push(created.map_err(|source| RuntimeError::Instantiation {
                type_name: mixin.name().clone(),
                source,
            })?);
        }
        // Only set here, right after construction.
        let _ = instance.inner.mixins.set(mixins);
        Ok(instance)
    }

    /// Descriptor of the composite
    pub fn descriptor(&self) -> &Arc<CompositeDescriptor> {
        &self.inner.descriptor
    }

    /// Compiled model
    pub fn model(&self) -> &CompositeModel {
        self.inner.descriptor.model()
    }

    /// Primary type
    pub fn primary_type(&self) -> &TypeName {
        self.inner.descriptor.primary_type()
    }

    /// Whether the composite can be used as `type_name`
    pub fn implements(&self, type_name: &TypeName) -> bool {
        self.model().implements(type_name, &self.inner.universe)
    }

    /// Whether both handles point to the same instance
    pub fn is_same(&self, other: &CompositeInstance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The module the composite was created in
    pub fn module(&self) -> Result<Module, InvocationError> {
        self.inner.module.upgrade().ok_or(InvocationError::Released)
    }

    /// Weak handle, as handed to fragments
    pub fn downgrade(&self) -> CompositeRef {
        CompositeRef {
            inner: Arc::downgrade(&self.inner),
            view: None,
        }
    }

    /// Weak handle resolving method names through `view`
    pub fn view_as(&self, view: impl Into<TypeName>) -> CompositeRef {
        self.downgrade().view_as(view.into())
    }

    /// Value bound through the builder's uses for `type_name`
    pub fn uses<T: std::any::Any + Send + Sync>(&self, type_name: &str) -> Option<Arc<T>> {
        self.inner.uses.get(type_name)
    }

    /// Invoke the first method named `method`
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> InvocationResult {
        let model = self
            .model()
            .find_method(method)
            .ok_or_else(|| self.no_such_method(method))?;
        self.dispatch(model, Cow::Owned(args))
    }

    /// Invoke `method` as declared by `view` or one of its supertypes
    pub fn invoke_on(&self, view: &TypeName, method: &str, args: Vec<Value>) -> InvocationResult {
        let model = self
            .model()
            .find_method_in(view, method, &self.inner.universe)
            .ok_or_else(|| self.no_such_method(method))?;
        self.dispatch(model, Cow::Owned(args))
    }

    fn no_such_method(&self, method: &str) -> InvocationError {
        InvocationError::NoSuchMethod {
            composite: self.primary_type().clone(),
            method: method.to_string(),
        }
    }

    fn method_instance(&self, method: &CompositeMethodModel) -> Result<Arc<MethodInstance>, InvocationError> {
        let handle = self
            .inner
            .methods
            .get(method.index())
            .ok_or_else(|| self.no_such_method(&method.method().name))?;
        handle.get_or_try_init(|| {
            let module = self.module()?;
            let concerns = method
                .concerns()
                .iter()
                .map(|concern| {
                    self.fragment(&module, concern, |factory, context| match factory {
                        FragmentFactory::Concern(factory) => factory(context),
                        other => Err(anyhow!("{} is a {}", concern.name(), other.kind().as_str())),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let side_effects = method
                .side_effects()
                .iter()
                .map(|side_effect| {
                    self.fragment(&module, side_effect, |factory, context| match factory {
                        FragmentFactory::SideEffect(factory) => factory(context),
                        other => Err(anyhow!("{} is a {}", side_effect.name(), other.kind().as_str())),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Arc::new(MethodInstance {
                concerns,
                side_effects,
            }))
        })
    }

    fn fragment<T>(
        &self,
        module: &Module,
        model: &FragmentModel,
        create: impl FnOnce(&FragmentFactory, &InjectionContext<'_>) -> anyhow::Result<T>,
    ) -> Result<T, InvocationError> {
        self.inner
            .uses
            .check(model.name(), model.dependencies())
            .map_err(InvocationError::failed)?;
        let context = InjectionContext::new(
            module,
            Some(self),
            model.dependencies(),
            &self.inner.uses,
            model.name(),
        );
        create(model.class().factory(), &context).map_err(|source| {
            InvocationError::failed(RuntimeError::Instantiation {
                type_name: model.name().clone(),
                source,
            })
        })
    }

    fn dispatch(&self, method: &CompositeMethodModel, args: Cow<'_, [Value]>) -> InvocationResult {
        let composite = self.primary_type();
        let name = &method.method().name;
        let mut phase = PhaseTracker::new(composite, name);

        phase.advance(InvocationPhase::Constraints);
        if let Err(violation) = method.constraints().check(composite, name, &args) {
            phase.advance(InvocationPhase::Failed);
            return Err(violation.into());
        }

        phase.advance(InvocationPhase::Concerns);
        let chain = match self.method_instance(method) {
            Ok(chain) => chain,
            Err(error) => {
                phase.advance(InvocationPhase::Failed);
                return Err(error);
            }
        };
        let mixin = self
            .inner
            .mixins
            .get()
            .and_then(|mixins| mixins.get(method.mixin_index()))
            .ok_or_else(|| self.no_such_method(name))?;

        let invocation = Invocation::new(self, method.method(), args);
        let reached_mixin = Cell::new(false);
        let result = Next::new(&chain.concerns, mixin.as_ref(), &reached_mixin).proceed(&invocation);
        if reached_mixin.get() {
            phase.advance(InvocationPhase::Mixin);
        }
        let value = match result {
            Ok(value) => value,
            Err(error) => {
                phase.advance(InvocationPhase::Failed);
                return Err(error);
            }
        };

        phase.advance(InvocationPhase::SideEffects);
        for side_effect in &chain.side_effects {
            if let Err(error) = side_effect.invoke(&invocation, &value) {
                if error.is_fatal() {
                    phase.advance(InvocationPhase::Failed);
                    return Err(error);
                }
                warn!(composite = %composite, method = %name, error = %error, "side-effect failed");
            }
        }
        phase.advance(InvocationPhase::Return);
        Ok(value)
    }

    fn slot(&self, name: &str, kind: StateKind) -> Result<&crate::model::StateDescriptor, InvocationError> {
        self.model()
            .state()
            .get(name)
            .filter(|slot| slot.kind() == kind)
            .ok_or_else(|| InvocationError::NoSuchState {
                composite: self.primary_type().clone(),
                name: name.to_string(),
            })
    }

    fn writable_slot(&self, name: &str, kind: StateKind) -> Result<&crate::model::StateDescriptor, InvocationError> {
        let slot = self.slot(name, kind)?;
        if self.model().is_immutable() || slot.is_immutable() {
            return Err(InvocationError::ImmutableState {
                composite: self.primary_type().clone(),
                name: name.to_string(),
            });
        }
        Ok(slot)
    }

    fn read_slot(&self, name: &str, kind: StateKind) -> InvocationResult {
        self.slot(name, kind)?;
        Ok(self
            .inner
            .state
            .read(|state| state.get(name).cloned().unwrap_or(Value::Null)))
    }

    /// Current value of a property
    pub fn property(&self, name: &str) -> InvocationResult {
        self.read_slot(name, StateKind::Property)
    }

    /// Replace a property value after checking its constraints
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<(), InvocationError> {
        let value = value.into();
        let slot = self.writable_slot(name, StateKind::Property)?;
        slot.check(self.primary_type(), &value)?;
        self.inner.state.write(|state| {
            state.insert(name.to_string(), value);
        });
        Ok(())
    }

    /// Identity held by an association, or null
    pub fn association(&self, name: &str) -> InvocationResult {
        self.read_slot(name, StateKind::Association)
    }

    /// Point an association at `reference`, or clear it
    pub fn set_association(&self, name: &str, reference: Option<&EntityReference>) -> Result<(), InvocationError> {
        let value = reference.map_or(Value::Null, |r| Value::String(r.identity().to_string()));
        let slot = self.writable_slot(name, StateKind::Association)?;
        slot.check(self.primary_type(), &value)?;
        self.inner.state.write(|state| {
            state.insert(name.to_string(), value);
        });
        Ok(())
    }

    /// Identities of a many-association, as an array
    pub fn many_association(&self, name: &str) -> InvocationResult {
        match self.read_slot(name, StateKind::ManyAssociation)? {
            Value::Null => Ok(Value::Array(Vec::new())),
            value => Ok(value),
        }
    }

    /// Append `reference`; returns false when it is already present
    pub fn add_to_many_association(&self, name: &str, reference: &EntityReference) -> Result<bool, InvocationError> {
        self.writable_slot(name, StateKind::ManyAssociation)?;
        let identity = Value::String(reference.identity().to_string());
        Ok(self.inner.state.write(|state| {
            let entry = state.entry(name.to_string()).or_insert(Value::Null);
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            match entry {
                Value::Array(items) if !items.contains(&identity) => {
                    items.push(identity);
                    true
                }
                _ => false,
            }
        }))
    }

    /// Remove `reference`; returns whether it was present
    pub fn remove_from_many_association(
        &self,
        name: &str,
        reference: &EntityReference,
    ) -> Result<bool, InvocationError> {
        self.writable_slot(name, StateKind::ManyAssociation)?;
        Ok(self.inner.state.write(|state| match state.get_mut(name) {
            Some(Value::Array(items)) => {
                let before = items.len();
                items.retain(|item| item.as_str() != Some(reference.identity()));
                items.len() != before
            }
            _ => false,
        }))
    }

    /// Identities of a named association, as an object
    pub fn named_association(&self, name: &str) -> InvocationResult {
        match self.read_slot(name, StateKind::NamedAssociation)? {
            Value::Null => Ok(Value::Object(Map::new())),
            value => Ok(value),
        }
    }

    /// Bind `key` to `reference`, replacing any previous binding
    pub fn put_named_association(
        &self,
        name: &str,
        key: &str,
        reference: &EntityReference,
    ) -> Result<(), InvocationError> {
        self.writable_slot(name, StateKind::NamedAssociation)?;
        let identity = Value::String(reference.identity().to_string());
        self.inner.state.write(|state| {
            let entry = state.entry(name.to_string()).or_insert(Value::Null);
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(items) = entry {
                items.insert(key.to_string(), identity);
            }
        });
        Ok(())
    }

    /// Remove the binding of `key`; returns whether there was one
    pub fn remove_named_association(&self, name: &str, key: &str) -> Result<bool, InvocationError> {
        self.writable_slot(name, StateKind::NamedAssociation)?;
        Ok(self.inner.state.write(|state| match state.get_mut(name) {
            Some(Value::Object(items)) => items.remove(key).is_some(),
            _ => false,
        }))
    }

    /// Snapshot of every state value
    pub fn state(&self) -> StateValues {
        self.inner.state.read(Clone::clone)
    }

    /// State as a JSON object
    pub fn state_object(&self) -> Value {
        self.inner
            .state
            .read(|state| Value::Object(state.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
    }

    /// Entity reference, for entity composites
    pub fn reference(&self) -> Option<EntityReference> {
        match &self.inner.state {
            StateBinding::Entity(entity) => Some(entity.read().reference.clone()),
            StateBinding::Local(_) => None,
        }
    }

    /// Status within the owning unit of work, for entity composites
    pub fn entity_status(&self) -> Option<EntityStatus> {
        match &self.inner.state {
            StateBinding::Entity(entity) => Some(entity.read().status),
            StateBinding::Local(_) => None,
        }
    }
}

impl fmt::Debug for CompositeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeInstance")
            .field("type", self.primary_type())
            .field("reference", &self.reference())
            .finish()
    }
}

/// Weak handle to a composite, optionally viewed as one of its types
///
/// Fragments hold these instead of the instance itself.
#[derive(Clone)]
pub struct CompositeRef {
    inner: Weak<CompositeInner>,
    view: Option<TypeName>,
}

impl CompositeRef {
    /// Same composite, resolving method names through `view`
    pub fn view_as(mut self, view: TypeName) -> Self {
        self.view = Some(view);
        self
    }

    /// The type methods are resolved through, if any
    pub fn view(&self) -> Option<&TypeName> {
        self.view.as_ref()
    }

    /// The composite, if it is still alive
    pub fn get(&self) -> Result<CompositeInstance, InvocationError> {
        self.inner
            .upgrade()
            .map(|inner| CompositeInstance { inner })
            .ok_or(InvocationError::Released)
    }

    /// Invoke a method on the composite, through the view when one is set
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> InvocationResult {
        let composite = self.get()?;
        match &self.view {
            Some(view) => composite.invoke_on(view, method, args),
            None => composite.invoke(method, args),
        }
    }
}

impl fmt::Debug for CompositeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeRef")
            .field("view", &self.view)
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
