// Copyright 2025 Cowboy AI, LLC.

//! Declarative type metadata
//!
//! Composites are described by explicit registrations instead of
//! reflection: every interface, fragment class and annotation type is
//! entered into a [`TypeUniverse`] with its supertypes, methods and
//! fragment declarations. Assignability, type-hierarchy traversal and
//! meta-info merging are all answered from that table.

mod descriptor;
mod universe;
mod value_type;

pub use descriptor::{
    Annotation, AnnotationMeta, FragmentDeclarations, MethodDeclaration, MethodKey,
    ParameterDeclaration, ReturnKind, StateKind, TypeDescriptor, TypeKind,
};
pub use universe::{TypeUniverse, TypeUniverseBuilder};
pub use value_type::ValueType;

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Names of the types the runtime itself defines
pub mod names {
    /// Root of every composite type set
    pub const COMPOSITE: &str = "cim.api.Composite";
    /// Base type appended to transient composites
    pub const TRANSIENT_COMPOSITE: &str = "cim.api.TransientComposite";
    /// Base type appended to value composites
    pub const VALUE_COMPOSITE: &str = "cim.api.ValueComposite";
    /// Base type appended to entity composites
    pub const ENTITY_COMPOSITE: &str = "cim.api.EntityComposite";
    /// Base type appended to service composites
    pub const SERVICE_COMPOSITE: &str = "cim.api.ServiceComposite";

    /// Marks a parameter or state slot as nullable
    pub const OPTIONAL: &str = "cim.api.Optional";
    /// Requests the value type's default as initial state
    pub const USE_DEFAULTS: &str = "cim.api.UseDefaults";
    /// Marks a composite or a state slot as immutable
    pub const IMMUTABLE: &str = "cim.api.Immutable";
    /// Pseudo-constraint reported when a non-optional value is null
    pub const NOT_OPTIONAL: &str = "cim.api.NotOptional";

    /// Generic mixin backing property accessors
    pub const PROPERTY_MIXIN: &str = "cim.runtime.PropertyMixin";
    /// Generic mixin backing association accessors
    pub const ASSOCIATION_MIXIN: &str = "cim.runtime.AssociationMixin";
    /// Generic mixin backing many-association accessors
    pub const MANY_ASSOCIATION_MIXIN: &str = "cim.runtime.ManyAssociationMixin";
    /// Generic mixin backing named-association accessors
    pub const NAMED_ASSOCIATION_MIXIN: &str = "cim.runtime.NamedAssociationMixin";

    /// Default importer handing out pre-registered instances
    pub const INSTANCE_IMPORTER: &str = "cim.runtime.InstanceImporter";

    /// Entity store port
    pub const ENTITY_STORE: &str = "cim.spi.EntityStore";
    /// Identity generator port
    pub const IDENTITY_GENERATOR: &str = "cim.spi.IdentityGenerator";
    /// Value serialization port
    pub const VALUE_SERIALIZATION: &str = "cim.spi.ValueSerialization";
    /// Metrics provider port
    pub const METRICS_PROVIDER: &str = "cim.spi.MetricsProvider";
    /// Entity finder port
    pub const ENTITY_FINDER: &str = "cim.spi.EntityFinder";

    /// Structure injection: the declaring module
    pub const STRUCTURE_MODULE: &str = "cim.structure.Module";
    /// Structure injection: the declaring layer
    pub const STRUCTURE_LAYER: &str = "cim.structure.Layer";
    /// Structure injection: the application
    pub const STRUCTURE_APPLICATION: &str = "cim.structure.Application";
    /// Structure injection: the unit of work factory of the module
    pub const STRUCTURE_UNIT_OF_WORK_FACTORY: &str = "cim.structure.UnitOfWorkFactory";
}

/// Fully-qualified name of a registered type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// Create a type name
    pub fn new(name: impl AsRef<str>) -> Self {
        TypeName(Arc::from(name.as_ref()))
    }

    /// The full name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last dot-separated segment
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TypeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for TypeName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TypeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        TypeName(Arc::from(name))
    }
}

impl From<&TypeName> for TypeName {
    fn from(name: &TypeName) -> Self {
        name.clone()
    }
}

impl PartialEq<str> for TypeName {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for TypeName {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// Scope at which a model is discoverable by type lookup
///
/// Ordered by rank: `Module < Layer < Application`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only the declaring module
    #[default]
    Module,
    /// Every module of the declaring layer
    Layer,
    /// Every layer that uses the declaring layer
    Application,
}

impl Visibility {
    /// Whether a model with this visibility is seen by a query at `scope`
    pub fn is_visible_at(self, scope: Visibility) -> bool {
        self >= scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_name() {
        assert_eq!(TypeName::new("cim.api.Composite").simple_name(), "Composite");
        assert_eq!(TypeName::new("Account").simple_name(), "Account");
    }

    #[test]
    fn test_visibility_rank() {
        assert!(Visibility::Module < Visibility::Layer);
        assert!(Visibility::Layer < Visibility::Application);
        assert!(Visibility::Application.is_visible_at(Visibility::Layer));
        assert!(!Visibility::Module.is_visible_at(Visibility::Layer));
        assert_eq!(Visibility::default(), Visibility::Module);
    }

    #[test]
    fn test_type_name_serde_is_transparent() {
        let name = TypeName::new("Order");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"Order\"");
        let back: TypeName = serde_json::from_str("\"Order\"").unwrap();
        assert_eq!(back, name);
    }
}
