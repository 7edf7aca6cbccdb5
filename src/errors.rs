// Copyright 2025 Cowboy AI, LLC.

//! Error types for assembly, binding, dispatch and units of work
//!
//! Every error carries the identifiers needed to diagnose it (type names,
//! method signatures, identities) and classifies itself through
//! [`ErrorKind`].

use crate::spi::EntityReference;
use crate::types::{TypeName, Visibility};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Classification of every failure raised by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Model construction failed; never retried
    BuildTime,
    /// Dependency resolution failed during the binding pass
    BindTime,
    /// Reported to the caller, who may retry with corrected input
    RuntimeRecoverable,
    /// Propagates verbatim out of the dispatch pipeline
    RuntimeFatal,
    /// Unit of work failed; retry the whole logical operation
    UnitOfWorkRecoverable,
    /// The API was used incorrectly (closed unit of work, unknown type)
    Usage,
}

/// Display helper for a list of type names, rendered as `[A, B]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeList(pub Vec<TypeName>);

impl fmt::Display for TypeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{t}")?;
        }
        f.write_str("]")
    }
}

impl From<&[TypeName]> for TypeList {
    fn from(types: &[TypeName]) -> Self {
        TypeList(types.to_vec())
    }
}

/// Errors raised while turning assemblies into an application model
#[derive(Debug, Clone, Error)]
pub enum AssemblyError {
    /// No mixin could be found for a method
    #[error("No implementation found for method {method} in {types}")]
    UnresolvedFragment {
        /// Method signature
        method: String,
        /// Full type set of the composite
        types: TypeList,
    },

    /// A constraint annotation has no compatible implementation
    #[error("Cannot find implementation of constraint @{annotation} for {value_type} in {member} of composite {types}")]
    UnresolvedConstraint {
        /// Constraint-declaring annotation type
        annotation: TypeName,
        /// Value type the constraint was applied to
        value_type: String,
        /// Method or state accessor carrying the annotation
        member: String,
        /// Full type set of the composite
        types: TypeList,
    },

    /// A referenced type was never registered in the type universe
    #[error("Unknown type {0}")]
    UnknownType(TypeName),

    /// A fragment class was declared in the wrong declaration list
    #[error("{fragment} is declared as a {expected} but is not one")]
    WrongFragmentKind {
        /// The fragment class
        fragment: TypeName,
        /// What the declaration list expected
        expected: &'static str,
    },

    /// Structural problem with a composite declaration
    #[error("Invalid composite {types}: {reason}")]
    InvalidComposite {
        /// Type set of the composite
        types: TypeList,
        /// What is wrong with it
        reason: String,
    },

    /// Two services or imported services share an identity
    #[error("Duplicated service reference: {identity} in module {module}")]
    DuplicateServiceIdentity {
        /// The duplicated identity
        identity: String,
        /// Name of the module declaring both
        module: String,
    },

    /// A layer assembly has an empty name
    #[error("Layer must have name set")]
    MissingLayerName,

    /// A module assembly has an empty name
    #[error("Module in layer {layer} must have name set")]
    MissingModuleName {
        /// Layer containing the unnamed module
        layer: String,
    },

    /// Two layers share a name
    #[error("Duplicate layer {0} in application")]
    DuplicateLayer(String),

    /// A layer uses a layer that does not exist
    #[error("Invalid application: layer {layer} uses unknown layer {used}")]
    InvalidApplication {
        /// The using layer
        layer: String,
        /// The unknown used layer name
        used: String,
    },

    /// Ambiguous type lookup during assembly
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// The binding pass failed
    #[error("Unable to bind: {application}: {source}")]
    Binding {
        /// Application name
        application: String,
        /// The underlying binding failure
        #[source]
        source: BindingError,
    },
}

impl AssemblyError {
    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssemblyError::Binding { .. } => ErrorKind::BindTime,
            _ => ErrorKind::BuildTime,
        }
    }
}

/// Errors raised by the binding visitor
#[derive(Debug, Clone, Error)]
pub enum BindingError {
    /// A dependency could not be satisfied from its module
    #[error("Unresolved {scope} dependency {name}: {injection_type} in {model} (module {module})")]
    UnresolvedDependency {
        /// Injection scope
        scope: &'static str,
        /// Dependency name
        name: String,
        /// Requested type
        injection_type: TypeName,
        /// Model declaring the dependency
        model: TypeName,
        /// Module of the model
        module: String,
    },

    /// A this-dependency names a type the composite does not implement
    #[error("{model} does not implement {injection_type} required by dependency {name}")]
    ThisNotImplemented {
        /// Dependency name
        name: String,
        /// Requested type
        injection_type: TypeName,
        /// Model declaring the dependency
        model: TypeName,
    },

    /// A structure dependency names an unknown structure type
    #[error("{injection_type} is not a structure type (dependency {name} in {model})")]
    UnknownStructure {
        /// Dependency name
        name: String,
        /// Requested type
        injection_type: TypeName,
        /// Model declaring the dependency
        model: TypeName,
    },

    /// A lookup performed during binding was ambiguous
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Errors raised by visibility-scoped lookup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// More than one distinct model matched at the same visibility rank
    #[error("More than one type matches {requested} at {visibility:?} visibility: {}", .candidates.join(", "))]
    AmbiguousType {
        /// Requested type
        requested: TypeName,
        /// Visibility rank shared by the candidates
        visibility: Visibility,
        /// Descriptions of the colliding candidates
        candidates: Vec<String>,
    },
}

impl LookupError {
    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::BuildTime
    }
}

/// A single failed constraint check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintViolation {
    /// Parameter or state name
    pub name: String,
    /// Annotation type of the violated constraint (`cim.api.NotOptional` for nulls)
    pub constraint: TypeName,
    /// Offending value
    pub value: Value,
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violates @{} with value {}", self.name, self.constraint, self.value)
    }
}

/// Constraint violations detected before an invocation or on a builder
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Constraint violation in {composite}.{member}: {}", display_violations(.violations))]
pub struct ConstraintViolationError {
    /// Primary type of the composite
    pub composite: TypeName,
    /// Method or state accessor
    pub member: String,
    /// Every violation found, in parameter order
    pub violations: Vec<ConstraintViolation>,
}

fn display_violations(violations: &[ConstraintViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConstraintViolationError {
    /// The first violation, which is the one reported to callers
    pub fn first(&self) -> Option<&ConstraintViolation> {
        self.violations.first()
    }
}

/// Errors raised while dispatching a composite method
#[derive(Debug, Error)]
pub enum InvocationError {
    /// Arguments or state failed constraint validation
    #[error(transparent)]
    ConstraintViolation(#[from] ConstraintViolationError),

    /// No method with that name on the composite
    #[error("No method {method} on composite {composite}")]
    NoSuchMethod {
        /// Primary type of the composite
        composite: TypeName,
        /// Requested method
        method: String,
    },

    /// No state slot with that name
    #[error("No state {name} in composite {composite}")]
    NoSuchState {
        /// Primary type of the composite
        composite: TypeName,
        /// Requested state name
        name: String,
    },

    /// Attempt to change immutable state
    #[error("State {name} of {composite} is immutable")]
    ImmutableState {
        /// Primary type of the composite
        composite: TypeName,
        /// State name
        name: String,
    },

    /// The composite behind a this-reference has been dropped
    #[error("Composite instance is no longer available")]
    Released,

    /// Ordinary failure raised by a fragment
    #[error(transparent)]
    Failed(anyhow::Error),

    /// Fatal failure that aborts dispatch even inside side-effects
    #[error("Fatal: {0}")]
    Fatal(anyhow::Error),
}

/// Result of invoking a composite method
pub type InvocationResult = Result<Value, InvocationError>;

impl InvocationError {
    /// Wrap an ordinary failure
    pub fn failed(error: impl Into<anyhow::Error>) -> Self {
        InvocationError::Failed(error.into())
    }

    /// Ordinary failure from a message
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        InvocationError::Failed(anyhow::Error::msg(message))
    }

    /// Wrap a fatal failure
    pub fn fatal(error: impl Into<anyhow::Error>) -> Self {
        InvocationError::Fatal(error.into())
    }

    /// Check if this error must never be swallowed
    pub fn is_fatal(&self) -> bool {
        matches!(self, InvocationError::Fatal(_))
    }

    /// Check if this is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, InvocationError::ConstraintViolation(_))
    }

    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvocationError::ConstraintViolation(_) => ErrorKind::RuntimeRecoverable,
            InvocationError::NoSuchMethod { .. }
            | InvocationError::NoSuchState { .. }
            | InvocationError::ImmutableState { .. }
            | InvocationError::Released => ErrorKind::Usage,
            InvocationError::Failed(_) | InvocationError::Fatal(_) => ErrorKind::RuntimeFatal,
        }
    }
}

/// Errors raised by the running application (instantiation, services, lookups)
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No model of the requested kind is visible from the module
    #[error("No {kind} of type {type_name} visible from module {module}")]
    NoSuchType {
        /// Model kind (transient, value, object, service)
        kind: &'static str,
        /// Requested type
        type_name: TypeName,
        /// Requesting module
        module: String,
    },

    /// Lookup was ambiguous
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Dispatch failed
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// A fragment, object or service could not be created
    #[error("Failed to instantiate {type_name}: {source}")]
    Instantiation {
        /// Type being instantiated
        type_name: TypeName,
        /// Cause
        #[source]
        source: anyhow::Error,
    },

    /// A uses-scoped dependency was not supplied to the builder
    #[error("No uses value of type {injection_type} supplied for {type_name}")]
    MissingUses {
        /// Type being instantiated
        type_name: TypeName,
        /// Missing dependency type
        injection_type: TypeName,
    },

    /// A service exists but its instance has the wrong shape
    #[error("Service {identity} is not available: {reason}")]
    ServiceUnavailable {
        /// Service identity
        identity: String,
        /// Why it cannot be used
        reason: String,
    },

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::Serialization(err.to_string())
    }
}

impl From<ConstraintViolationError> for RuntimeError {
    fn from(err: ConstraintViolationError) -> Self {
        RuntimeError::Invocation(InvocationError::ConstraintViolation(err))
    }
}

impl RuntimeError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NoSuchType { .. })
    }

    /// Check if this is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, RuntimeError::Invocation(e) if e.is_constraint_violation())
    }

    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Lookup(e) => e.kind(),
            RuntimeError::Invocation(e) => e.kind(),
            RuntimeError::Instantiation { .. } | RuntimeError::Serialization(_) => {
                ErrorKind::RuntimeFatal
            }
            RuntimeError::NoSuchType { .. }
            | RuntimeError::MissingUses { .. }
            | RuntimeError::ServiceUnavailable { .. } => ErrorKind::Usage,
        }
    }
}

/// Errors raised by entity store implementations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityStoreError {
    /// No state stored for the reference
    #[error("Entity not found: {0}")]
    NotFound(EntityReference),

    /// Optimistic version check failed during prepare
    #[error("Concurrent modification of {}", display_references(.0))]
    ConcurrentModification(Vec<EntityReference>),

    /// An entity to be created already exists in the store
    #[error("Entity already exists: {0}")]
    AlreadyExists(EntityReference),

    /// State could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any other backend failure
    #[error("Entity store error: {0}")]
    Storage(String),
}

fn display_references(references: &[EntityReference]) -> String {
    references
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<serde_json::Error> for EntityStoreError {
    fn from(err: serde_json::Error) -> Self {
        EntityStoreError::Serialization(err.to_string())
    }
}

/// Errors raised by a unit of work
#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    /// Operation on a completed or discarded unit of work
    #[error("Unit of work has been closed ({status})")]
    Closed {
        /// Terminal status
        status: &'static str,
    },

    /// Pause on a unit of work that is not active
    #[error("Unit of work is not active")]
    NotActive,

    /// Resume on a unit of work that was not paused
    #[error("Unit of work has not been paused")]
    NotPaused,

    /// The entity does not exist or was removed in this unit of work
    #[error("No such entity {reference} of type {type_name} (usecase {usecase})")]
    NoSuchEntity {
        /// Entity reference
        reference: EntityReference,
        /// Requested type
        type_name: TypeName,
        /// Usecase name
        usecase: String,
    },

    /// No entity model of that type is visible
    #[error("No entity of type {type_name} visible from module {module}")]
    NoSuchEntityType {
        /// Requested type
        type_name: TypeName,
        /// Requesting module
        module: String,
    },

    /// The reference is already attached to this unit of work
    #[error("Entity {0} is already present in this unit of work")]
    EntityAlreadyExists(EntityReference),

    /// Version conflict detected by the store during completion
    #[error("Concurrent modification of {} (usecase {usecase})", display_references(.references))]
    ConcurrentEntityModification {
        /// Entities modified by someone else
        references: Vec<EntityReference>,
        /// Usecase name
        usecase: String,
    },

    /// A completion callback vetoed the completion
    #[error("Unit of work completion failed: {0}")]
    Completion(String),

    /// Entity state failed validation
    #[error(transparent)]
    ConstraintViolation(#[from] ConstraintViolationError),

    /// Store failure other than a version conflict
    #[error(transparent)]
    Store(#[from] EntityStoreError),

    /// Lookup, instantiation or service failure
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl UnitOfWorkError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            UnitOfWorkError::NoSuchEntity { .. }
                | UnitOfWorkError::NoSuchEntityType { .. }
                | UnitOfWorkError::Store(EntityStoreError::NotFound(_))
        )
    }

    /// Check if this is a concurrency error
    pub fn is_concurrency_error(&self) -> bool {
        matches!(self, UnitOfWorkError::ConcurrentEntityModification { .. })
    }

    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            UnitOfWorkError::Closed { .. }
            | UnitOfWorkError::NotActive
            | UnitOfWorkError::NotPaused
            | UnitOfWorkError::NoSuchEntityType { .. }
            | UnitOfWorkError::EntityAlreadyExists(_) => ErrorKind::Usage,
            UnitOfWorkError::NoSuchEntity { .. }
            | UnitOfWorkError::ConcurrentEntityModification { .. }
            | UnitOfWorkError::Completion(_)
            | UnitOfWorkError::Store(_) => ErrorKind::UnitOfWorkRecoverable,
            UnitOfWorkError::ConstraintViolation(_) => ErrorKind::RuntimeRecoverable,
            UnitOfWorkError::Runtime(e) => e.kind(),
        }
    }
}
