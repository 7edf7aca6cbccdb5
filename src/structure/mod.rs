// Copyright 2025 Cowboy AI, LLC.

//! Application structure: assembly, model, lookup and running instances
//!
//! ```text
//! Application
//! └── Layer (uses other layers)
//!     └── Module
//!         ├── transients, values, entities
//!         ├── services, imported services
//!         └── objects
//! ```
//!
//! Assemblies are mutable declarations. The [`ApplicationModelFactory`]
//! turns them into an immutable, bound [`ApplicationModel`], from which an
//! [`Application`] is instantiated.

mod assembly;
mod factory;
mod instance;
mod lazy;
mod lookup;
mod model;
mod visitor;

pub use assembly::{
    ApplicationAssembly, CompositeAssembler, CompositeAssembly, ImportedServiceAssembly,
    LayerAssembly, ModuleAssembly, ObjectAssembly, ServiceAssembly,
};
pub use factory::{ApplicationModelFactory, SUPPORT_LAYER, SUPPORT_MODULE};
pub use instance::{Application, Layer, Module};
pub(crate) use instance::ModuleRef;
pub use lazy::LazyHandle;
pub use lookup::{ServiceModelRef, TypeLookup, VisibleModel, VisibleScopes};
pub use model::{
    ApplicationModel, CompositeDescriptor, ImportedServiceModel, LayerModel, ModuleId,
    ModuleModel, ObjectModel, ServiceModel,
};
pub use visitor::{
    walk, ApplicationDescription, BindingVisitor, CompositeDescription, DescribeVisitor,
    LayerDescription, MethodDescription, ModelNode, ModelRef, ModelVisitor, ModuleDescription,
    Resolution, ServiceDescription, StateDescription, VisitContext,
};
