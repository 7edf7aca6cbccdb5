// Copyright 2025 Cowboy AI, LLC.

use super::{CompositeMethodModel, MixinModel, StateModel};
use crate::meta_info::MetaInfo;
use crate::types::{names, MethodKey, TypeName, TypeUniverse};
use indexmap::IndexMap;
use serde::Serialize;

/// Kind of composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompositeKind {
    /// Created by builders, mutable state, not persisted
    Transient,
    /// Immutable once built
    Value,
    /// Persisted through units of work
    Entity,
    /// Singleton per service identity
    Service,
}

impl CompositeKind {
    /// Framework type appended to the type set
    pub fn base_type(self) -> &'static str {
        match self {
            CompositeKind::Transient => names::TRANSIENT_COMPOSITE,
            CompositeKind::Value => names::VALUE_COMPOSITE,
            CompositeKind::Entity => names::ENTITY_COMPOSITE,
            CompositeKind::Service => names::SERVICE_COMPOSITE,
        }
    }

    /// Lowercase name for messages
    pub fn as_str(self) -> &'static str {
        match self {
            CompositeKind::Transient => "transient",
            CompositeKind::Value => "value",
            CompositeKind::Entity => "entity",
            CompositeKind::Service => "service",
        }
    }
}

/// Declared fragments of one composite
#[derive(Debug, Clone)]
pub struct CompositeDeclaration {
    /// Composite kind
    pub kind: CompositeKind,
    /// Type set; the first is the primary type
    pub types: Vec<TypeName>,
    /// Explicit mixins, before any discovered ones
    pub mixins: Vec<TypeName>,
    /// Explicit concerns
    pub concerns: Vec<TypeName>,
    /// Explicit side-effects
    pub side_effects: Vec<TypeName>,
    /// Explicit constraints
    pub constraints: Vec<TypeName>,
    /// Assembly-level meta info
    pub meta_info: MetaInfo,
}

impl CompositeDeclaration {
    /// Declaration with the given type set and no explicit fragments
    pub fn new<I, T>(kind: CompositeKind, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        Self {
            kind,
            types: types.into_iter().map(Into::into).collect(),
            mixins: Vec::new(),
            concerns: Vec::new(),
            side_effects: Vec::new(),
            constraints: Vec::new(),
            meta_info: MetaInfo::new(),
        }
    }
}

/// Compiled composite: type set, dispatch table, mixins and state
#[derive(Debug)]
pub struct CompositeModel {
    pub(crate) kind: CompositeKind,
    pub(crate) types: Vec<TypeName>,
    pub(crate) mixin_types: Vec<TypeName>,
    pub(crate) mixins: Vec<MixinModel>,
    pub(crate) methods: IndexMap<MethodKey, CompositeMethodModel>,
    pub(crate) state: StateModel,
    pub(crate) immutable: bool,
    pub(crate) meta_info: MetaInfo,
}

impl CompositeModel {
    /// Composite kind
    pub fn kind(&self) -> CompositeKind {
        self.kind
    }

    /// Primary type
    pub fn primary_type(&self) -> &TypeName {
        &self.types[0]
    }

    /// Full type set, including the framework base type
    pub fn types(&self) -> &[TypeName] {
        &self.types
    }

    /// Every type whose methods the composite implements, including this-dependency types
    pub fn mixin_types(&self) -> &[TypeName] {
        &self.mixin_types
    }

    /// Mixins in first-use order
    pub fn mixins(&self) -> &[MixinModel] {
        &self.mixins
    }

    /// Mixin implementing a method
    pub fn mixin_for(&self, key: &MethodKey) -> Option<&MixinModel> {
        self.methods.get(key).map(|m| &self.mixins[m.mixin])
    }

    /// Method models in implementation order
    pub fn methods(&self) -> impl Iterator<Item = &CompositeMethodModel> {
        self.methods.values()
    }

    /// Number of methods
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Method by key
    pub fn method(&self, key: &MethodKey) -> Option<&CompositeMethodModel> {
        self.methods.get(key)
    }

    /// Method by position
    pub fn method_at(&self, index: usize) -> Option<&CompositeMethodModel> {
        self.methods.get_index(index).map(|(_, m)| m)
    }

    /// First method with the given name
    pub fn find_method(&self, name: &str) -> Option<&CompositeMethodModel> {
        self.methods.values().find(|m| m.method.name == name)
    }

    /// Method named `name` as seen through `view` and its supertypes
    pub fn find_method_in(
        &self,
        view: &TypeName,
        name: &str,
        universe: &TypeUniverse,
    ) -> Option<&CompositeMethodModel> {
        universe.types_of(view).into_iter().find_map(|t| {
            self.methods.get(&MethodKey {
                declaring_type: t,
                name: name.to_string(),
            })
        })
    }

    /// State slots
    pub fn state(&self) -> &StateModel {
        &self.state
    }

    /// Whether the whole composite is immutable after construction
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Merged meta info
    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }

    /// Whether the composite can be used as `type_name`
    pub fn implements(&self, type_name: &TypeName, universe: &TypeUniverse) -> bool {
        self.types
            .iter()
            .chain(self.mixin_types.iter())
            .any(|t| universe.is_assignable(t, type_name))
    }
}
