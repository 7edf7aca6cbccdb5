// Copyright 2025 Cowboy AI, LLC.

//! Behavioral fragments
//!
//! A composite's behavior is assembled from fragments:
//!
//! - **Mixins** implement methods
//! - **Concerns** wrap an invocation and may short-circuit it
//! - **Side-effects** observe a successful result
//! - **Constraints** validate parameters and state before anything runs
//!
//! Fragment classes are registered in the [`TypeUniverse`](crate::types::TypeUniverse)
//! together with a factory producing instances and the applies-to
//! predicates that decide which methods they serve.

mod applies_to;
mod builtin;
mod helper;

pub use applies_to::{AppliesTo, AppliesToContext, AppliesToFilter};
pub use builtin::{InstanceImporter, ServiceImporter};
pub(crate) use builtin::register_builtins;
pub use helper::{AssemblyHelper, FragmentHandle};

use crate::errors::{InvocationError, InvocationResult};
use crate::model::DependencyDeclaration;
use crate::runtime::{InjectionContext, Invocation, Next};
use crate::types::{
    Annotation, MethodDeclaration, ReturnKind, TypeDescriptor, TypeName, ValueType,
};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Implements composite methods
pub trait Mixin: Send + Sync {
    /// Invoke the method described by `invocation`
    fn invoke(&self, invocation: &Invocation<'_>) -> InvocationResult;
}

impl<F> Mixin for F
where
    F: Fn(&Invocation<'_>) -> InvocationResult + Send + Sync,
{
    fn invoke(&self, invocation: &Invocation<'_>) -> InvocationResult {
        self(invocation)
    }
}

/// Wraps an invocation; delegate with `next.proceed(invocation)` or return early
pub trait Concern: Send + Sync {
    /// Handle the invocation
    fn invoke(&self, invocation: &Invocation<'_>, next: Next<'_>) -> InvocationResult;
}

impl<F> Concern for F
where
    F: Fn(&Invocation<'_>, Next<'_>) -> InvocationResult + Send + Sync,
{
    fn invoke(&self, invocation: &Invocation<'_>, next: Next<'_>) -> InvocationResult {
        self(invocation, next)
    }
}

/// Observes the result of a successful invocation
pub trait SideEffect: Send + Sync {
    /// React to `result`; ordinary errors are logged and swallowed
    fn invoke(&self, invocation: &Invocation<'_>, result: &Value) -> Result<(), InvocationError>;
}

impl<F> SideEffect for F
where
    F: Fn(&Invocation<'_>, &Value) -> Result<(), InvocationError> + Send + Sync,
{
    fn invoke(&self, invocation: &Invocation<'_>, result: &Value) -> Result<(), InvocationError> {
        self(invocation, result)
    }
}

/// Validates a non-null value against a constraint annotation
pub trait Constraint: Send + Sync {
    /// Whether `value` satisfies `annotation`
    fn is_valid(&self, annotation: &Annotation, value: &Value) -> bool;
}

impl<F> Constraint for F
where
    F: Fn(&Annotation, &Value) -> bool + Send + Sync,
{
    fn is_valid(&self, annotation: &Annotation, value: &Value) -> bool {
        self(annotation, value)
    }
}

/// Creates mixin instances
pub type MixinFactory =
    Arc<dyn Fn(&InjectionContext<'_>) -> anyhow::Result<Box<dyn Mixin>> + Send + Sync>;
/// Creates concern instances
pub type ConcernFactory =
    Arc<dyn Fn(&InjectionContext<'_>) -> anyhow::Result<Box<dyn Concern>> + Send + Sync>;
/// Creates side-effect instances
pub type SideEffectFactory =
    Arc<dyn Fn(&InjectionContext<'_>) -> anyhow::Result<Box<dyn SideEffect>> + Send + Sync>;
/// Creates object instances
pub type ObjectFactory = Arc<
    dyn Fn(&InjectionContext<'_>) -> anyhow::Result<Arc<dyn Any + Send + Sync>> + Send + Sync,
>;

/// Kind of fragment a class provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FragmentKind {
    /// Method implementation
    Mixin,
    /// Invocation wrapper
    Concern,
    /// Result observer
    SideEffect,
}

impl FragmentKind {
    /// Lowercase name for messages
    pub fn as_str(self) -> &'static str {
        match self {
            FragmentKind::Mixin => "mixin",
            FragmentKind::Concern => "concern",
            FragmentKind::SideEffect => "side-effect",
        }
    }
}

/// Instance factory of a fragment class
#[derive(Clone)]
pub enum FragmentFactory {
    /// Produces mixins
    Mixin(MixinFactory),
    /// Produces concerns
    Concern(ConcernFactory),
    /// Produces side-effects
    SideEffect(SideEffectFactory),
}

impl FragmentFactory {
    /// Kind of fragment produced
    pub fn kind(&self) -> FragmentKind {
        match self {
            FragmentFactory::Mixin(_) => FragmentKind::Mixin,
            FragmentFactory::Concern(_) => FragmentKind::Concern,
            FragmentFactory::SideEffect(_) => FragmentKind::SideEffect,
        }
    }
}

/// State declared by a field of a mixin class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateField {
    /// Field name, which is also the state name
    pub name: String,
    /// Kind and type of the state
    pub returns: ReturnKind,
    /// Field annotations (constraints, optional, use-defaults)
    pub annotations: Vec<Annotation>,
}

impl StateField {
    /// A property field
    pub fn property(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            returns: ReturnKind::Property(value_type),
            annotations: Vec::new(),
        }
    }

    /// Add an annotation
    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// This field viewed as an accessor declared by `mixin`
    pub(crate) fn as_accessor(&self, mixin: &TypeName) -> MethodDeclaration {
        let mut accessor = MethodDeclaration::new(self.name.clone()).with_returns(self.returns.clone());
        accessor.declaring_type = mixin.clone();
        accessor.annotations = self.annotations.clone();
        accessor
    }
}

/// A mixin, concern or side-effect class
#[derive(Clone)]
pub struct FragmentClass {
    descriptor: TypeDescriptor,
    factory: FragmentFactory,
    generic: bool,
    applies_to: Vec<AppliesTo>,
    state_fields: Vec<StateField>,
    dependencies: Vec<DependencyDeclaration>,
}

struct SharedFn<F: ?Sized>(Arc<F>);

impl<F> Mixin for SharedFn<F>
where
    F: Fn(&Invocation<'_>) -> InvocationResult + Send + Sync + ?Sized,
{
    fn invoke(&self, invocation: &Invocation<'_>) -> InvocationResult {
        (self.0)(invocation)
    }
}

impl<F> Concern for SharedFn<F>
where
    F: Fn(&Invocation<'_>, Next<'_>) -> InvocationResult + Send + Sync + ?Sized,
{
    fn invoke(&self, invocation: &Invocation<'_>, next: Next<'_>) -> InvocationResult {
        (self.0)(invocation, next)
    }
}

impl<F> SideEffect for SharedFn<F>
where
    F: Fn(&Invocation<'_>, &Value) -> Result<(), InvocationError> + Send + Sync + ?Sized,
{
    fn invoke(&self, invocation: &Invocation<'_>, result: &Value) -> Result<(), InvocationError> {
        (self.0)(invocation, result)
    }
}

impl FragmentClass {
    fn with_factory(name: impl Into<TypeName>, factory: FragmentFactory, generic: bool) -> Self {
        Self {
            descriptor: TypeDescriptor::class(name),
            factory,
            generic,
            applies_to: Vec::new(),
            state_fields: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Typed mixin class; implements the interfaces named with [`implements`](Self::implements)
    pub fn mixin<F>(name: impl Into<TypeName>, factory: F) -> Self
    where
        F: Fn(&InjectionContext<'_>) -> anyhow::Result<Box<dyn Mixin>> + Send + Sync + 'static,
    {
        Self::with_factory(name, FragmentFactory::Mixin(Arc::new(factory)), false)
    }

    /// Generic mixin class, able to serve any method its applies-to accepts
    pub fn generic_mixin<F>(name: impl Into<TypeName>, factory: F) -> Self
    where
        F: Fn(&InjectionContext<'_>) -> anyhow::Result<Box<dyn Mixin>> + Send + Sync + 'static,
    {
        Self::with_factory(name, FragmentFactory::Mixin(Arc::new(factory)), true)
    }

    /// Typed mixin whose instances share one function and need no injection
    pub fn stateless_mixin<F>(name: impl Into<TypeName>, f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> InvocationResult + Send + Sync + 'static,
    {
        let shared = Arc::new(f);
        Self::mixin(name, move |_| Ok(Box::new(SharedFn(shared.clone())) as Box<dyn Mixin>))
    }

    /// Generic variant of [`stateless_mixin`](Self::stateless_mixin)
    pub fn stateless_generic_mixin<F>(name: impl Into<TypeName>, f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> InvocationResult + Send + Sync + 'static,
    {
        let shared = Arc::new(f);
        Self::generic_mixin(name, move |_| Ok(Box::new(SharedFn(shared.clone())) as Box<dyn Mixin>))
    }

    /// Typed concern class
    pub fn concern<F>(name: impl Into<TypeName>, factory: F) -> Self
    where
        F: Fn(&InjectionContext<'_>) -> anyhow::Result<Box<dyn Concern>> + Send + Sync + 'static,
    {
        Self::with_factory(name, FragmentFactory::Concern(Arc::new(factory)), false)
    }

    /// Generic concern class
    pub fn generic_concern<F>(name: impl Into<TypeName>, factory: F) -> Self
    where
        F: Fn(&InjectionContext<'_>) -> anyhow::Result<Box<dyn Concern>> + Send + Sync + 'static,
    {
        Self::with_factory(name, FragmentFactory::Concern(Arc::new(factory)), true)
    }

    /// Generic concern whose instances share one function
    pub fn stateless_concern<F>(name: impl Into<TypeName>, f: F) -> Self
    where
        F: Fn(&Invocation<'_>, Next<'_>) -> InvocationResult + Send + Sync + 'static,
    {
        let shared = Arc::new(f);
        Self::generic_concern(name, move |_| {
            Ok(Box::new(SharedFn(shared.clone())) as Box<dyn Concern>)
        })
    }

    /// Typed side-effect class
    pub fn side_effect<F>(name: impl Into<TypeName>, factory: F) -> Self
    where
        F: Fn(&InjectionContext<'_>) -> anyhow::Result<Box<dyn SideEffect>> + Send + Sync + 'static,
    {
        Self::with_factory(name, FragmentFactory::SideEffect(Arc::new(factory)), false)
    }

    /// Generic side-effect class
    pub fn generic_side_effect<F>(name: impl Into<TypeName>, factory: F) -> Self
    where
        F: Fn(&InjectionContext<'_>) -> anyhow::Result<Box<dyn SideEffect>> + Send + Sync + 'static,
    {
        Self::with_factory(name, FragmentFactory::SideEffect(Arc::new(factory)), true)
    }

    /// Generic side-effect whose instances share one function
    pub fn stateless_side_effect<F>(name: impl Into<TypeName>, f: F) -> Self
    where
        F: Fn(&Invocation<'_>, &Value) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        let shared = Arc::new(f);
        Self::generic_side_effect(name, move |_| {
            Ok(Box::new(SharedFn(shared.clone())) as Box<dyn SideEffect>)
        })
    }

    /// Declare an implemented interface
    pub fn implements(mut self, interface: impl Into<TypeName>) -> Self {
        self.descriptor.supertypes.push(interface.into());
        self
    }

    /// Declare the class's own version of a method, with its annotations
    pub fn implements_method(mut self, method: MethodDeclaration) -> Self {
        self.descriptor = self.descriptor.method(method);
        self
    }

    /// Add an applies-to declaration site; sites combine with AND
    pub fn applies_to(mut self, applies_to: AppliesTo) -> Self {
        self.applies_to.push(applies_to);
        self
    }

    /// Declare state held in a field
    pub fn state(mut self, field: StateField) -> Self {
        self.state_fields.push(field);
        self
    }

    /// Declare an injected dependency
    pub fn depends_on(mut self, dependency: DependencyDeclaration) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Concerns declared on the class itself
    pub fn concerns<I, T>(mut self, concerns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.descriptor = self.descriptor.concerns(concerns);
        self
    }

    /// Side-effects declared on the class itself
    pub fn side_effects<I, T>(mut self, side_effects: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.descriptor = self.descriptor.side_effects(side_effects);
        self
    }

    /// Constraints declared on the class itself
    pub fn constraints<I, T>(mut self, constraints: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.descriptor = self.descriptor.constraints(constraints);
        self
    }

    /// Class name
    pub fn name(&self) -> &TypeName {
        &self.descriptor.name
    }

    /// Class descriptor
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Kind of fragment
    pub fn kind(&self) -> FragmentKind {
        self.factory.kind()
    }

    /// Whether the class is generic-capable
    pub fn is_generic(&self) -> bool {
        self.generic
    }

    /// Applies-to declaration sites
    pub fn applies_to_sites(&self) -> &[AppliesTo] {
        &self.applies_to
    }

    /// State fields
    pub fn state_fields(&self) -> &[StateField] {
        &self.state_fields
    }

    /// Declared dependencies
    pub fn dependencies(&self) -> &[DependencyDeclaration] {
        &self.dependencies
    }

    /// Instance factory
    pub fn factory(&self) -> &FragmentFactory {
        &self.factory
    }
}

impl fmt::Debug for FragmentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentClass")
            .field("name", self.name())
            .field("kind", &self.kind())
            .field("generic", &self.generic)
            .field("applies_to", &self.applies_to)
            .finish()
    }
}

/// A constraint implementation for one annotation and value type
#[derive(Clone)]
pub struct ConstraintClass {
    name: TypeName,
    annotation: TypeName,
    value_type: ValueType,
    constraint: Arc<dyn Constraint>,
}

impl ConstraintClass {
    /// Register `constraint` as the implementation of `annotation` for `value_type`
    pub fn new(
        name: impl Into<TypeName>,
        annotation: impl Into<TypeName>,
        value_type: ValueType,
        constraint: impl Constraint + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            annotation: annotation.into(),
            value_type,
            constraint: Arc::new(constraint),
        }
    }

    /// Class name
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    /// Implemented annotation
    pub fn annotation(&self) -> &TypeName {
        &self.annotation
    }

    /// Value type the implementation checks
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Run the check
    pub fn is_valid(&self, annotation: &Annotation, value: &Value) -> bool {
        self.constraint.is_valid(annotation, value)
    }
}

impl fmt::Debug for ConstraintClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintClass")
            .field("name", &self.name)
            .field("annotation", &self.annotation)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// A plain object class instantiated with injection, also used for service importers
#[derive(Clone)]
pub struct ObjectClass {
    descriptor: TypeDescriptor,
    dependencies: Vec<DependencyDeclaration>,
    factory: ObjectFactory,
}

impl ObjectClass {
    /// Object class produced by `factory`
    pub fn new<F>(name: impl Into<TypeName>, factory: F) -> Self
    where
        F: Fn(&InjectionContext<'_>) -> anyhow::Result<Arc<dyn Any + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            descriptor: TypeDescriptor::class(name),
            dependencies: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    /// Declare an implemented interface
    pub fn implements(mut self, interface: impl Into<TypeName>) -> Self {
        self.descriptor.supertypes.push(interface.into());
        self
    }

    /// Declare an injected dependency
    pub fn depends_on(mut self, dependency: DependencyDeclaration) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Class name
    pub fn name(&self) -> &TypeName {
        &self.descriptor.name
    }

    /// Class descriptor
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Declared dependencies
    pub fn dependencies(&self) -> &[DependencyDeclaration] {
        &self.dependencies
    }

    /// Instance factory
    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }
}

impl fmt::Debug for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectClass")
            .field("name", self.name())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}
