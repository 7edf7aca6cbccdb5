// Copyright 2025 Cowboy AI, LLC.

use super::{AnnotationMeta, MethodDeclaration, TypeDescriptor, TypeKind, TypeName};
use crate::errors::AssemblyError;
use crate::fragment::{register_builtins, ConstraintClass, FragmentClass, ObjectClass};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Registry of every type, fragment class, constraint class and object class
///
/// The universe replaces runtime reflection: type hierarchy queries,
/// fragment discovery and meta-info merging are answered from it.
#[derive(Default)]
pub struct TypeUniverse {
    types: IndexMap<TypeName, TypeDescriptor>,
    fragments: IndexMap<TypeName, Arc<FragmentClass>>,
    constraints: IndexMap<TypeName, Arc<ConstraintClass>>,
    objects: IndexMap<TypeName, Arc<ObjectClass>>,
}

impl TypeUniverse {
    /// Builder pre-populated with the runtime's own types
    pub fn builder() -> TypeUniverseBuilder {
        register_builtins(TypeUniverseBuilder {
            universe: TypeUniverse::default(),
        })
    }

    /// Descriptor of a type
    pub fn descriptor(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    /// Whether the type is registered
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Fragment class by name
    pub fn fragment(&self, name: &str) -> Option<&Arc<FragmentClass>> {
        self.fragments.get(name)
    }

    /// Constraint class by name
    pub fn constraint(&self, name: &str) -> Option<&Arc<ConstraintClass>> {
        self.constraints.get(name)
    }

    /// Object class by name
    pub fn object_class(&self, name: &str) -> Option<&Arc<ObjectClass>> {
        self.objects.get(name)
    }

    /// Annotation semantics, for annotation types
    pub fn annotation_meta(&self, name: &str) -> Option<&AnnotationMeta> {
        self.descriptor(name).and_then(|d| d.annotation_meta.as_ref())
    }

    /// Whether `name` is a constraint-declaring annotation type
    pub fn is_constraint_declaration(&self, name: &str) -> bool {
        self.descriptor(name)
            .is_some_and(TypeDescriptor::is_constraint_declaration)
    }

    /// Whether a value of type `from` can be used where `to` is expected
    pub fn is_assignable(&self, from: &str, to: &str) -> bool {
        from == to || self.types_of(from).iter().any(|t| t == to)
    }

    /// `name` followed by all its supertypes, depth-first in declaration order
    pub fn types_of(&self, name: &str) -> Vec<TypeName> {
        let mut seen = IndexSet::new();
        self.collect_pre_order(&TypeName::new(name), &mut seen);
        seen.into_iter().collect()
    }

    fn collect_pre_order(&self, name: &TypeName, seen: &mut IndexSet<TypeName>) {
        if !seen.insert(name.clone()) {
            return;
        }
        if let Some(descriptor) = self.descriptor(name) {
            for supertype in &descriptor.supertypes {
                self.collect_pre_order(supertype, seen);
            }
        }
    }

    /// Interfaces among [`types_of`](Self::types_of)
    pub fn interfaces_of(&self, name: &str) -> Vec<TypeName> {
        self.types_of(name)
            .into_iter()
            .filter(|t| {
                self.descriptor(t)
                    .is_some_and(|d| d.kind == TypeKind::Interface)
            })
            .collect()
    }

    /// Order in which type meta info is merged: supertypes in reverse
    /// declaration order, deepest first, the type itself last
    pub fn meta_info_order(&self, name: &str) -> Vec<TypeName> {
        let mut seen = IndexSet::new();
        self.collect_post_order(&TypeName::new(name), &mut HashSet::new(), &mut seen);
        seen.into_iter().collect()
    }

    fn collect_post_order(
        &self,
        name: &TypeName,
        visiting: &mut HashSet<TypeName>,
        seen: &mut IndexSet<TypeName>,
    ) {
        if seen.contains(name) || !visiting.insert(name.clone()) {
            return;
        }
        if let Some(descriptor) = self.descriptor(name) {
            for supertype in descriptor.supertypes.iter().rev() {
                self.collect_post_order(supertype, visiting, seen);
            }
        }
        seen.insert(name.clone());
    }

    /// Methods of `name` and its supertypes; a method redeclared by a more
    /// specific type hides the inherited one
    pub fn methods_of(&self, name: &str) -> Vec<&MethodDeclaration> {
        let mut names = HashSet::new();
        let mut methods = Vec::new();
        for t in self.types_of(name) {
            if let Some(descriptor) = self.descriptor(&t) {
                for method in &descriptor.methods {
                    if names.insert(method.name.as_str()) {
                        methods.push(method);
                    }
                }
            }
        }
        methods
    }

    /// Registered type names in registration order
    pub fn type_names(&self) -> impl Iterator<Item = &TypeName> {
        self.types.keys()
    }
}

impl fmt::Debug for TypeUniverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeUniverse")
            .field("types", &self.types.len())
            .field("fragments", &self.fragments.len())
            .field("constraints", &self.constraints.len())
            .field("objects", &self.objects.len())
            .finish()
    }
}

/// Collects registrations and validates them into a [`TypeUniverse`]
pub struct TypeUniverseBuilder {
    universe: TypeUniverse,
}

impl TypeUniverseBuilder {
    /// Register an interface, class or annotation type
    pub fn register(mut self, descriptor: TypeDescriptor) -> Self {
        self.universe
            .types
            .insert(descriptor.name.clone(), descriptor);
        self
    }

    /// Register a fragment class (and its descriptor)
    pub fn fragment(mut self, fragment: FragmentClass) -> Self {
        let name = fragment.name().clone();
        self.universe
            .types
            .insert(name.clone(), fragment.descriptor().clone());
        self.universe.fragments.insert(name, Arc::new(fragment));
        self
    }

    /// Register a constraint class
    pub fn constraint(mut self, constraint: ConstraintClass) -> Self {
        let name = constraint.name().clone();
        self.universe
            .types
            .insert(name.clone(), TypeDescriptor::class(name.clone()));
        self.universe.constraints.insert(name, Arc::new(constraint));
        self
    }

    /// Register an object or service-importer class
    pub fn object(mut self, object: ObjectClass) -> Self {
        let name = object.name().clone();
        self.universe
            .types
            .insert(name.clone(), object.descriptor().clone());
        self.universe.objects.insert(name, Arc::new(object));
        self
    }

    /// Check that every referenced supertype and constraint annotation exists
    pub fn build(self) -> Result<TypeUniverse, AssemblyError> {
        let universe = self.universe;
        for descriptor in universe.types.values() {
            for supertype in &descriptor.supertypes {
                if !universe.contains(supertype) {
                    return Err(AssemblyError::UnknownType(supertype.clone()));
                }
            }
        }
        for constraint in universe.constraints.values() {
            if !universe.contains(constraint.annotation()) {
                return Err(AssemblyError::UnknownType(constraint.annotation().clone()));
            }
        }
        Ok(universe)
    }
}
