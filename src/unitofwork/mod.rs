// Copyright 2025 Cowboy AI, LLC.

//! Units of work: tracked entity changes committed through the entity store
//!
//! ```text
//! Open ⇄ Paused
//!  │        │
//!  ▼        ▼
//! Completing ──► Committed
//!  │     │
//!  │     └──► Discarded (concurrent modification)
//!  └──► Open (callback veto, store failure)
//! ```
//!
//! A unit of work belongs to the thread that created it and is pushed
//! onto that thread's stack of current units of work. Pausing removes it
//! from the stack, resuming pushes it back.

mod builder;
mod current;
mod query;
mod status;
mod usecase;

pub use builder::EntityBuilder;
pub use query::{Query, QueryBuilder};
pub use status::{AmbientAction, UnitOfWorkInput, UnitOfWorkStatus};
pub use usecase::Usecase;

use crate::config::UnitOfWorkOptions;
use crate::errors::{EntityStoreError, UnitOfWorkError};
use crate::meta_info::MetaInfo;
use crate::runtime::{CompositeInstance, StateBinding, Uses};
use crate::spi::{EntityReference, EntityState, EntityStatus, MetricsCounter, TimerContext};
use crate::state_machine::{MealyMachine, State};
use crate::structure::{CompositeDescriptor, Module};
use crate::types::TypeName;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// How a unit of work ended, as reported to callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Changes were committed
    Completed,
    /// Changes were dropped
    Discarded,
}

/// Hooks around completion of a unit of work
pub trait UnitOfWorkCallback {
    /// Called before the store is asked to prepare; an error vetoes completion
    fn before_completion(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once the unit of work has ended
    fn after_completion(&self, status: CompletionStatus);
}

struct TrackedEntity {
    state: Arc<RwLock<EntityState>>,
    instance: CompositeInstance,
}

impl TrackedEntity {
    fn status(&self) -> EntityStatus {
        self.state.read().status
    }
}

struct UnitOfWorkInner {
    id: Uuid,
    module: Module,
    usecase: Usecase,
    meta_info: MetaInfo,
    machine: MealyMachine<UnitOfWorkStatus>,
    entities: IndexMap<EntityReference, TrackedEntity>,
    callbacks: Vec<Rc<dyn UnitOfWorkCallback>>,
    counter: Arc<dyn MetricsCounter>,
    timer: Option<TimerContext>,
}

/// A logical transaction over entities
///
/// Cloning yields another handle to the same unit of work. Handles are
/// neither `Send` nor `Sync`.
#[derive(Clone)]
pub struct UnitOfWork {
    inner: Rc<RefCell<UnitOfWorkInner>>,
}

impl UnitOfWork {
    fn open(module: Module, usecase: Usecase) -> Self {
        let metrics = module.metrics_provider();
        let prefix = format!("{}.{}.UnitOfWork", module.layer().name(), module.name());
        let counter = metrics.counter(&format!("{prefix}.counter"));
        counter.increment();
        let timer = TimerContext::start(metrics.timer(&format!("{prefix}.timer")));

        let unit_of_work = Self {
            inner: Rc::new(RefCell::new(UnitOfWorkInner {
                id: Uuid::new_v4(),
                module,
                usecase,
                meta_info: MetaInfo::new(),
                machine: MealyMachine::new(UnitOfWorkStatus::Open),
                entities: IndexMap::new(),
                callbacks: Vec::new(),
                counter,
                timer: Some(timer),
            })),
        };
        current::push(unit_of_work.clone());
        debug!(
            unit_of_work = %unit_of_work.id(),
            usecase = %unit_of_work.usecase().name(),
            "unit of work opened"
        );
        unit_of_work
    }

    /// Identifier of this unit of work
    pub fn id(&self) -> Uuid {
        self.inner.borrow().id
    }

    /// The usecase it was opened for
    pub fn usecase(&self) -> Usecase {
        self.inner.borrow().usecase.clone()
    }

    /// Current status
    pub fn status(&self) -> UnitOfWorkStatus {
        *self.inner.borrow().machine.current_state()
    }

    /// Whether the unit of work accepts operations
    pub fn is_open(&self) -> bool {
        self.status() == UnitOfWorkStatus::Open
    }

    /// Whether both handles point to the same unit of work
    pub fn is_same(&self, other: &UnitOfWork) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Module the unit of work resolves entity types from
    pub fn module(&self) -> Module {
        self.inner.borrow().module.clone()
    }

    /// Attach meta info, e.g. [`UnitOfWorkOptions`]
    pub fn set_meta_info<T: Any + Send + Sync>(&self, value: T) {
        self.inner.borrow_mut().meta_info.set(value);
    }

    /// Register a completion callback
    pub fn add_callback(&self, callback: Rc<dyn UnitOfWorkCallback>) {
        self.inner.borrow_mut().callbacks.push(callback);
    }

    /// Number of tracked entities, including those marked for removal
    pub fn tracked_entities(&self) -> usize {
        self.inner.borrow().entities.len()
    }

    fn closed_error(status: UnitOfWorkStatus) -> UnitOfWorkError {
        UnitOfWorkError::Closed {
            status: status.name(),
        }
    }

    pub(crate) fn check_open(&self) -> Result<(), UnitOfWorkError> {
        match self.status() {
            UnitOfWorkStatus::Open => Ok(()),
            UnitOfWorkStatus::Paused | UnitOfWorkStatus::Completing => Err(UnitOfWorkError::NotActive),
            terminal => Err(Self::closed_error(terminal)),
        }
    }

    fn transition(&self, to: UnitOfWorkStatus, input: UnitOfWorkInput) -> Result<(), UnitOfWorkError> {
        let action = {
            let mut inner = self.inner.borrow_mut();
            let from = *inner.machine.current_state();
            match inner.machine.transition_to(to, input) {
                Ok(transition) => transition.output,
                Err(_) if from.is_terminal() => return Err(Self::closed_error(from)),
                Err(_) if input == UnitOfWorkInput::Resume => return Err(UnitOfWorkError::NotPaused),
                Err(_) => return Err(UnitOfWorkError::NotActive),
            }
        };
        match action {
            AmbientAction::Attach => current::push(self.clone()),
            AmbientAction::Detach => current::remove(self),
            AmbientAction::Keep => {}
        }
        Ok(())
    }

    fn usecase_name(&self) -> String {
        self.inner.borrow().usecase.name().to_string()
    }

    fn track(&self, reference: EntityReference, state: Arc<RwLock<EntityState>>, instance: CompositeInstance) {
        self.inner
            .borrow_mut()
            .entities
            .insert(reference, TrackedEntity { state, instance });
    }

    fn entity_descriptor(&self, type_name: &TypeName) -> Result<Arc<CompositeDescriptor>, UnitOfWorkError> {
        let module = self.module();
        module
            .type_lookup()
            .lookup_entity(type_name)
            .map_err(|e| UnitOfWorkError::Runtime(e.into()))?
            .ok_or_else(|| UnitOfWorkError::NoSuchEntityType {
                type_name: type_name.clone(),
                module: module.name().to_string(),
            })
    }

    /// Create a new entity with default state
    pub fn new_entity(
        &self,
        type_name: impl Into<TypeName>,
        identity: Option<String>,
    ) -> Result<CompositeInstance, UnitOfWorkError> {
        self.new_entity_builder(type_name, identity)?.new_instance()
    }

    /// Builder for a new entity; the identity is generated when `None`
    pub fn new_entity_builder(
        &self,
        type_name: impl Into<TypeName>,
        identity: Option<String>,
    ) -> Result<EntityBuilder, UnitOfWorkError> {
        self.check_open()?;
        let descriptor = self.entity_descriptor(&type_name.into())?;
        Ok(EntityBuilder::new(self.clone(), descriptor, identity))
    }

    pub(crate) fn attach_new(
        &self,
        descriptor: Arc<CompositeDescriptor>,
        state: EntityState,
    ) -> Result<CompositeInstance, UnitOfWorkError> {
        self.check_open()?;
        let reference = state.reference.clone();
        if self.inner.borrow().entities.contains_key(&reference) {
            return Err(UnitOfWorkError::EntityAlreadyExists(reference));
        }
        let owner = self.module().model_module(descriptor.module());
        let state = Arc::new(RwLock::new(state));
        let instance = CompositeInstance::create(
            descriptor,
            &owner,
            StateBinding::Entity(state.clone()),
            Uses::default(),
        )?;
        self.track(reference, state, instance.clone());
        Ok(instance)
    }

    /// Entity `reference` of `type_name`, loading it from the store if needed
    pub fn get(
        &self,
        type_name: impl Into<TypeName>,
        reference: impl Into<EntityReference>,
    ) -> Result<CompositeInstance, UnitOfWorkError> {
        self.check_open()?;
        let type_name = type_name.into();
        let reference = reference.into();

        let tracked = self
            .inner
            .borrow()
            .entities
            .get(&reference)
            .map(|t| (t.status(), t.instance.clone()));
        if let Some((status, instance)) = tracked {
            if status == EntityStatus::Removed || !instance.implements(&type_name) {
                return Err(self.no_such_entity(reference, type_name));
            }
            return Ok(instance);
        }

        let module = self.module();
        let models = module.type_lookup().lookup_entities(&type_name);
        if models.is_empty() {
            return Err(UnitOfWorkError::NoSuchEntityType {
                type_name,
                module: module.name().to_string(),
            });
        }

        let store = module.entity_store()?;
        let mut state = store.entity_state(&reference).map_err(|e| match e {
            EntityStoreError::NotFound(_) => self.no_such_entity(reference.clone(), type_name.clone()),
            other => UnitOfWorkError::Store(other),
        })?;
        let descriptor = models
            .into_iter()
            .find(|m| m.primary_type() == &state.entity_type)
            .ok_or_else(|| UnitOfWorkError::NoSuchEntityType {
                type_name: state.entity_type.clone(),
                module: module.name().to_string(),
            })?;

        state.status = EntityStatus::Loaded;
        let owner = module.model_module(descriptor.module());
        let state = Arc::new(RwLock::new(state));
        let instance = CompositeInstance::create(
            descriptor,
            &owner,
            StateBinding::Entity(state.clone()),
            Uses::default(),
        )?;
        self.track(reference, state, instance.clone());
        Ok(instance)
    }

    fn no_such_entity(&self, reference: EntityReference, type_name: TypeName) -> UnitOfWorkError {
        UnitOfWorkError::NoSuchEntity {
            reference,
            type_name,
            usecase: self.usecase_name(),
        }
    }

    /// Remove an entity
    ///
    /// New entities are forgotten at once; loaded ones are deleted from the
    /// store on completion.
    pub fn remove(&self, entity: &CompositeInstance) -> Result<(), UnitOfWorkError> {
        self.check_open()?;
        let reference = entity.reference().ok_or_else(|| UnitOfWorkError::NoSuchEntityType {
            type_name: entity.primary_type().clone(),
            module: self.module().name().to_string(),
        })?;

        let status = self.inner.borrow().entities.get(&reference).map(TrackedEntity::status);
        match status {
            Some(EntityStatus::New) => {
                self.inner.borrow_mut().entities.shift_remove(&reference);
                Ok(())
            }
            Some(EntityStatus::Loaded | EntityStatus::Updated) => {
                if let Some(tracked) = self.inner.borrow().entities.get(&reference) {
                    tracked.state.write().status = EntityStatus::Removed;
                }
                Ok(())
            }
            Some(EntityStatus::Removed) | None => {
                Err(self.no_such_entity(reference, entity.primary_type().clone()))
            }
        }
    }

    /// Start a query over entities of `type_name`
    pub fn new_query(&self, type_name: impl Into<TypeName>) -> QueryBuilder {
        QueryBuilder::new(self.clone(), type_name.into())
    }

    /// Commit all changes through the entity store
    pub fn complete(&self) -> Result<(), UnitOfWorkError> {
        self.check_open()?;
        self.transition(UnitOfWorkStatus::Completing, UnitOfWorkInput::Complete)?;

        let callbacks = self.inner.borrow().callbacks.clone();
        for callback in &callbacks {
            if let Err(veto) = callback.before_completion() {
                self.transition(UnitOfWorkStatus::Open, UnitOfWorkInput::Abort)?;
                return Err(UnitOfWorkError::Completion(veto.to_string()));
            }
        }

        let (new_states, changed_states, removed) = {
            let inner = self.inner.borrow();
            let mut new_states = Vec::new();
            let mut changed_states = Vec::new();
            let mut removed = Vec::new();
            for (reference, tracked) in &inner.entities {
                let state = tracked.state.read();
                match state.status {
                    EntityStatus::New => new_states.push(state.clone()),
                    EntityStatus::Updated => changed_states.push(state.clone()),
                    EntityStatus::Removed => removed.push(reference.clone()),
                    EntityStatus::Loaded => {}
                }
            }
            (new_states, changed_states, removed)
        };
        let changes = new_states.len() + changed_states.len() + removed.len();

        if changes > 0 {
            let store = match self.module().entity_store() {
                Ok(store) => store,
                Err(e) => {
                    self.transition(UnitOfWorkStatus::Open, UnitOfWorkInput::Abort)?;
                    return Err(e.into());
                }
            };
            let outcome = store
                .prepare(new_states, changed_states, removed)
                .and_then(|committer| committer.commit());
            if let Err(error) = outcome {
                return Err(self.completion_failed(error));
            }
        }

        self.transition(UnitOfWorkStatus::Committed, UnitOfWorkInput::Commit)?;
        info!(
            unit_of_work = %self.id(),
            usecase = %self.usecase_name(),
            changes,
            "unit of work completed"
        );
        self.close(CompletionStatus::Completed);
        Ok(())
    }

    fn completion_failed(&self, error: EntityStoreError) -> UnitOfWorkError {
        match error {
            EntityStoreError::ConcurrentModification(references) => {
                let usecase = self.usecase_name();
                if let Err(e) = self.transition(UnitOfWorkStatus::Discarded, UnitOfWorkInput::Fail) {
                    return e;
                }
                self.close(CompletionStatus::Discarded);
                UnitOfWorkError::ConcurrentEntityModification {
                    references,
                    usecase,
                }
            }
            other => match self.transition(UnitOfWorkStatus::Open, UnitOfWorkInput::Abort) {
                Ok(()) => UnitOfWorkError::Store(other),
                Err(e) => e,
            },
        }
    }

    /// Drop all tracked changes; does nothing once the unit of work has ended
    pub fn discard(&self) {
        if self.status().is_terminal() {
            return;
        }
        if self
            .transition(UnitOfWorkStatus::Discarded, UnitOfWorkInput::Discard)
            .is_ok()
        {
            debug!(unit_of_work = %self.id(), "unit of work discarded");
            self.close(CompletionStatus::Discarded);
        }
    }

    fn close(&self, status: CompletionStatus) {
        let (callbacks, timer) = {
            let mut inner = self.inner.borrow_mut();
            inner.entities.clear();
            inner.counter.decrement();
            (std::mem::take(&mut inner.callbacks), inner.timer.take())
        };
        if let Some(timer) = timer {
            timer.stop();
        }
        for callback in callbacks {
            callback.after_completion(status);
        }
    }

    fn prune_on_pause(&self) -> bool {
        let inner = self.inner.borrow();
        inner
            .meta_info
            .get::<UnitOfWorkOptions>()
            .or_else(|| inner.usecase.meta_info().get::<UnitOfWorkOptions>())
            .copied()
            .unwrap_or(inner.module.application_model().config().unit_of_work)
            .prune_on_pause
    }

    /// Detach from the thread's current stack, keeping tracked state
    pub fn pause(&self) -> Result<(), UnitOfWorkError> {
        self.check_open()?;
        self.transition(UnitOfWorkStatus::Paused, UnitOfWorkInput::Pause)?;
        if self.prune_on_pause() {
            let mut inner = self.inner.borrow_mut();
            let before = inner.entities.len();
            inner.entities.retain(|_, tracked| tracked.status() != EntityStatus::Loaded);
            debug!(pruned = before - inner.entities.len(), "unit of work pruned on pause");
        }
        Ok(())
    }

    /// Reattach a paused unit of work to the thread
    pub fn resume(&self) -> Result<(), UnitOfWorkError> {
        match self.status() {
            UnitOfWorkStatus::Paused => self.transition(UnitOfWorkStatus::Open, UnitOfWorkInput::Resume),
            status if status.is_terminal() => Err(Self::closed_error(status)),
            _ => Err(UnitOfWorkError::NotPaused),
        }
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("UnitOfWork")
            .field("id", &inner.id)
            .field("usecase", &inner.usecase.name())
            .field("status", inner.machine.current_state())
            .field("entities", &inner.entities.len())
            .finish()
    }
}

/// Opens units of work for a module
#[derive(Debug, Clone)]
pub struct UnitOfWorkFactory {
    module: Module,
}

impl UnitOfWorkFactory {
    pub(crate) fn new(module: Module) -> Self {
        Self { module }
    }

    /// Open a unit of work with the default usecase
    pub fn new_unit_of_work(&self) -> UnitOfWork {
        self.new_unit_of_work_for(Usecase::default())
    }

    /// Open a unit of work for `usecase`
    pub fn new_unit_of_work_for(&self, usecase: Usecase) -> UnitOfWork {
        UnitOfWork::open(self.module.clone(), usecase)
    }

    /// Innermost open unit of work of this thread
    pub fn current_unit_of_work(&self) -> Option<UnitOfWork> {
        current::current()
    }

    /// Whether this thread has a current unit of work
    pub fn is_unit_of_work_active(&self) -> bool {
        current::depth() > 0
    }
}
