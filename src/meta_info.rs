// Copyright 2025 Cowboy AI, LLC.

//! Type-keyed metadata attached to assemblies, models and usecases

use crate::types::{Annotation, TypeName};
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Storage for metadata attached to a declaration
///
/// Values are stored by their `TypeId`, one per type; annotations are
/// stored by annotation type. Later additions replace earlier ones, which
/// is how type-hierarchy meta info is merged (deepest first, concrete
/// type last).
#[derive(Clone, Default)]
pub struct MetaInfo {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    annotations: IndexMap<TypeName, Annotation>,
}

impl MetaInfo {
    /// Create an empty meta info
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous value of the same type
    pub fn set<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// Builder form of [`set`](Self::set)
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.set(value);
        self
    }

    /// Get a value by type
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Check if a value of the type is present
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// Record an annotation, replacing one of the same type
    pub fn add_annotation(&mut self, annotation: Annotation) -> &mut Self {
        self.annotations
            .insert(annotation.annotation_type.clone(), annotation);
        self
    }

    /// Annotation by type
    pub fn annotation(&self, annotation_type: &str) -> Option<&Annotation> {
        self.annotations.get(annotation_type)
    }

    /// Whether an annotation of the type is present
    pub fn has_annotation(&self, annotation_type: &str) -> bool {
        self.annotations.contains_key(annotation_type)
    }

    /// All annotations in insertion order
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    /// Copy everything from `other` over this meta info
    pub fn merge(&mut self, other: &MetaInfo) {
        for (type_id, value) in &other.values {
            self.values.insert(*type_id, value.clone());
        }
        for annotation in other.annotations.values() {
            self.add_annotation(annotation.clone());
        }
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.annotations.is_empty()
    }
}

impl fmt::Debug for MetaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaInfo")
            .field("values", &self.values.len())
            .field("annotations", &self.annotations.keys().collect::<Vec<_>>())
            .finish()
    }
}
