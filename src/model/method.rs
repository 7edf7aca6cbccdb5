// Copyright 2025 Cowboy AI, LLC.

use super::{DependencyModel, InjectionScope, MethodConstraintsModel};
use crate::fragment::{FragmentClass, FragmentHandle};
use crate::types::{MethodDeclaration, MethodKey, TypeName};
use std::sync::Arc;

/// A fragment used by one composite, with its own dependency models
///
/// The handle is shared across every composite of the assembly pass; the
/// dependencies are bound per composite.
#[derive(Debug)]
pub struct FragmentModel {
    handle: Arc<FragmentHandle>,
    dependencies: Vec<DependencyModel>,
}

impl FragmentModel {
    pub(crate) fn new(handle: Arc<FragmentHandle>) -> Self {
        let dependencies = handle
            .class()
            .dependencies()
            .iter()
            .cloned()
            .map(DependencyModel::new)
            .collect();
        Self {
            handle,
            dependencies,
        }
    }

    /// Fragment class name
    pub fn name(&self) -> &TypeName {
        self.handle.name()
    }

    /// Fragment class
    pub fn class(&self) -> &Arc<FragmentClass> {
        self.handle.class()
    }

    /// Shared handle
    pub fn handle(&self) -> &Arc<FragmentHandle> {
        &self.handle
    }

    /// Dependency models
    pub fn dependencies(&self) -> &[DependencyModel] {
        &self.dependencies
    }

    /// Types requested through this-scoped dependencies
    pub fn this_types(&self) -> impl Iterator<Item = &TypeName> {
        self.dependencies
            .iter()
            .filter(|d| d.scope() == InjectionScope::This)
            .map(DependencyModel::injection_type)
    }
}

/// Mixin used by a composite
pub type MixinModel = FragmentModel;
/// Concern in a method chain
pub type ConcernModel = FragmentModel;
/// Side-effect of a method
pub type SideEffectModel = FragmentModel;

/// One composite method bound to its mixin, constraints, concerns and side-effects
///
/// The chain is fixed when the model is built.
#[derive(Debug)]
pub struct CompositeMethodModel {
    pub(crate) index: usize,
    pub(crate) method: MethodDeclaration,
    pub(crate) mixin: usize,
    pub(crate) constraints: MethodConstraintsModel,
    pub(crate) concerns: Vec<ConcernModel>,
    pub(crate) side_effects: Vec<SideEffectModel>,
}

impl CompositeMethodModel {
    /// Position of the method in the composite
    pub fn index(&self) -> usize {
        self.index
    }

    /// The declared method
    pub fn method(&self) -> &MethodDeclaration {
        &self.method
    }

    /// Key of the method
    pub fn key(&self) -> MethodKey {
        self.method.key()
    }

    /// Index of the implementing mixin in the composite's mixin list
    pub fn mixin_index(&self) -> usize {
        self.mixin
    }

    /// Parameter constraints
    pub fn constraints(&self) -> &MethodConstraintsModel {
        &self.constraints
    }

    /// Concern chain, outermost first
    pub fn concerns(&self) -> &[ConcernModel] {
        &self.concerns
    }

    /// Side-effects in run order
    pub fn side_effects(&self) -> &[SideEffectModel] {
        &self.side_effects
    }

    /// Names of the concerns in chain order
    pub fn concern_names(&self) -> Vec<&TypeName> {
        self.concerns.iter().map(FragmentModel::name).collect()
    }

    /// Names of the side-effects in run order
    pub fn side_effect_names(&self) -> Vec<&TypeName> {
        self.side_effects.iter().map(FragmentModel::name).collect()
    }
}
