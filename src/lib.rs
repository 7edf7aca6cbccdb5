//! # CIM Composite
//!
//! Composite-oriented runtime for the Composable Information Machine.
//!
//! Behaviour is assembled from small fragments instead of inheritance:
//! - **Mixins**: implement the methods of a composite type
//! - **Concerns**: wrap method calls and may short-circuit them
//! - **Side-effects**: run after a call; their failures never reach the caller
//! - **Constraints**: validate parameters and state
//!
//! Composites come in five kinds: transients, values, entities, services
//! and the plain objects they collaborate with. They live in modules, modules
//! live in layers, and layers form an application. Visibility rules decide
//! which module sees which types and services.
//!
//! ## Flow
//!
//! 1. Register types and fragment classes in a [`TypeUniverse`](types::TypeUniverse)
//! 2. Declare the structure with an [`ApplicationAssembly`](structure::ApplicationAssembly)
//! 3. Build and bind it with the [`ApplicationModelFactory`](structure::ApplicationModelFactory)
//! 4. Instantiate, activate and use the [`Application`](structure::Application)
//!
//! Entities are read and written inside a [`UnitOfWork`](unitofwork::UnitOfWork)
//! which commits through the [`EntityStore`](spi::EntityStore) port.

#![warn(missing_docs)]

pub mod config;
pub mod errors;
pub mod fragment;
pub mod meta_info;
pub mod model;
pub mod runtime;
pub mod spi;
pub mod state_machine;
pub mod structure;
pub mod types;
pub mod unitofwork;

pub use config::{ApplicationConfig, ApplicationMode, UnitOfWorkOptions};
pub use errors::{
    AssemblyError, BindingError, ConstraintViolationError, EntityStoreError, ErrorKind,
    InvocationError, InvocationResult, LookupError, RuntimeError, UnitOfWorkError,
};
pub use fragment::{Concern, Constraint, FragmentClass, Mixin, ObjectClass, SideEffect};
pub use meta_info::MetaInfo;
pub use model::{CompositeKind, CompositeModel};
pub use runtime::{
    CompositeInstance, CompositeRef, InjectionContext, Invocation, Next, TransientBuilder, Uses,
    ValueBuilder,
};
pub use spi::{EntityReference, EntityState, EntityStatus, EntityStore, MemoryEntityStore};
pub use state_machine::{MealyMachine, MealyStateTransitions, State, TransitionInput};
pub use structure::{
    Application, ApplicationAssembly, ApplicationModel, ApplicationModelFactory, Layer, Module,
};
pub use types::{TypeName, TypeUniverse, TypeUniverseBuilder, Visibility};
pub use unitofwork::{UnitOfWork, UnitOfWorkFactory, Usecase};
