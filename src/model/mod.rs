// Copyright 2025 Cowboy AI, LLC.

//! Composite models
//!
//! A [`CompositeModel`] is the compiled form of a composite declaration:
//! every method of its type set bound to one mixin, an ordered concern
//! chain, side-effects and parameter constraints, plus the state slots the
//! composite carries. Models are immutable after the binding pass.

mod builder;
mod composite;
mod constraints;
mod dependency;
mod method;
mod state;

pub use builder::CompositeModelBuilder;
pub use composite::{CompositeDeclaration, CompositeKind, CompositeModel};
pub use constraints::{ConstraintModel, MethodConstraintsModel, ValueConstraintsModel};
pub use dependency::{
    DependencyDeclaration, DependencyModel, InjectionScope, ResolvedDependency, ServiceBinding,
};
pub use method::{CompositeMethodModel, ConcernModel, FragmentModel, MixinModel, SideEffectModel};
pub use state::{
    DefaultValuePolicy, QualifiedName, StateDeclaration, StateDeclarations, StateDescriptor,
    StateModel,
};
