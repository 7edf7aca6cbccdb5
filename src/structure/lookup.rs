// Copyright 2025 Cowboy AI, LLC.

//! Visibility-scoped type lookup
//!
//! A module sees, in order:
//!
//! 1. every model of its own module
//! 2. layer-visible models of the other modules in its layer
//! 3. application-visible models of the other modules in its layer
//! 4. application-visible models of the layers its layer uses
//!
//! The first scope holding a match answers. Inside a scope exact type
//! matches are tried before assignable ones, and two distinct candidates
//! sharing a visibility rank are an ambiguity error.

use super::model::{
    ApplicationModel, CompositeDescriptor, ImportedServiceModel, LayerModel, ModuleId,
    ModuleModel, ObjectModel, ServiceModel,
};
use crate::errors::LookupError;
use crate::types::{TypeName, TypeUniverse, Visibility};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A model discoverable by type
pub trait VisibleModel {
    /// Owning module
    fn module(&self) -> ModuleId;

    /// Declared visibility
    fn visibility(&self) -> Visibility;

    /// Types the model is registered under
    fn types(&self) -> &[TypeName];

    /// Short description used in ambiguity errors
    fn describe(&self) -> String;
}

impl VisibleModel for CompositeDescriptor {
    fn module(&self) -> ModuleId {
        self.module
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn types(&self) -> &[TypeName] {
        self.model.types()
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.model.primary_type(), self.model.kind().as_str())
    }
}

impl VisibleModel for ServiceModel {
    fn module(&self) -> ModuleId {
        self.descriptor.module
    }

    fn visibility(&self) -> Visibility {
        self.descriptor.visibility
    }

    fn types(&self) -> &[TypeName] {
        self.descriptor.model.types()
    }

    fn describe(&self) -> String {
        format!("service {}", self.identity)
    }
}

impl VisibleModel for ImportedServiceModel {
    fn module(&self) -> ModuleId {
        self.module
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn types(&self) -> &[TypeName] {
        &self.types
    }

    fn describe(&self) -> String {
        format!("imported service {}", self.identity)
    }
}

impl VisibleModel for ObjectModel {
    fn module(&self) -> ModuleId {
        self.module
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn types(&self) -> &[TypeName] {
        &self.types
    }

    fn describe(&self) -> String {
        format!("object {}", self.name())
    }
}

/// A composite or imported service found by service lookup
#[derive(Debug, Clone)]
pub enum ServiceModelRef {
    /// Service composite
    Composite(Arc<ServiceModel>),
    /// Imported service
    Imported(Arc<ImportedServiceModel>),
}

impl ServiceModelRef {
    /// Owning module
    pub fn module(&self) -> ModuleId {
        match self {
            ServiceModelRef::Composite(s) => s.module(),
            ServiceModelRef::Imported(s) => s.module,
        }
    }

    /// Service identity
    pub fn identity(&self) -> &str {
        match self {
            ServiceModelRef::Composite(s) => &s.identity,
            ServiceModelRef::Imported(s) => &s.identity,
        }
    }

    /// Declared visibility
    pub fn visibility(&self) -> Visibility {
        match self {
            ServiceModelRef::Composite(s) => s.visibility(),
            ServiceModelRef::Imported(s) => s.visibility,
        }
    }

    /// Types the service is registered under
    pub fn types(&self) -> &[TypeName] {
        match self {
            ServiceModelRef::Composite(s) => VisibleModel::types(s.as_ref()),
            ServiceModelRef::Imported(s) => &s.types,
        }
    }

    fn same_service(&self, other: &ServiceModelRef) -> bool {
        self.module() == other.module() && self.identity() == other.identity()
    }
}

#[derive(Clone, Copy)]
enum ScopeFilter {
    Any,
    Exactly(Visibility),
}

impl ScopeFilter {
    fn admits(self, visibility: Visibility) -> bool {
        match self {
            ScopeFilter::Any => true,
            ScopeFilter::Exactly(v) => v == visibility,
        }
    }
}

fn type_matches(universe: &TypeUniverse, types: &[TypeName], requested: &TypeName, exact: bool) -> bool {
    types.iter().any(|t| {
        if exact {
            t == requested
        } else {
            universe.is_assignable(t, requested)
        }
    })
}

/// The four lookup scopes of one module
pub struct VisibleScopes<'a> {
    application: &'a ApplicationModel,
    module: ModuleId,
}

impl<'a> VisibleScopes<'a> {
    /// Scopes seen from `module`
    pub fn new(application: &'a ApplicationModel, module: ModuleId) -> Self {
        Self {
            application,
            module,
        }
    }

    fn layer(&self) -> Option<&'a LayerModel> {
        self.application.layers.get(self.module.layer)
    }

    fn scopes(&self) -> Vec<Vec<(&'a ModuleModel, ScopeFilter)>> {
        let Some(layer) = self.layer() else {
            return Vec::new();
        };
        let own_id = self.module;
        let own = self.application.module(own_id);
        let siblings = || layer.modules.iter().filter(move |m| m.id != own_id);

        let mut scopes = Vec::with_capacity(4);
        scopes.push(own.map(|m| (m, ScopeFilter::Any)).into_iter().collect());
        scopes.push(
            siblings()
                .map(|m| (m, ScopeFilter::Exactly(Visibility::Layer)))
                .collect(),
        );
        scopes.push(
            siblings()
                .map(|m| (m, ScopeFilter::Exactly(Visibility::Application)))
                .collect(),
        );
        scopes.push(
            layer
                .used_layers
                .iter()
                .filter_map(|index| self.application.layers.get(*index))
                .flat_map(|used| used.modules.iter())
                .map(|m| (m, ScopeFilter::Exactly(Visibility::Application)))
                .collect(),
        );
        scopes
    }

    /// The unique best match for `requested` among the models `select` picks
    pub fn lookup<M, F>(&self, requested: &TypeName, select: F) -> Result<Option<Arc<M>>, LookupError>
    where
        M: VisibleModel + 'a,
        F: Fn(&'a ModuleModel) -> &'a [Arc<M>],
    {
        let universe = self.application.universe();
        for scope in self.scopes() {
            for exact in [true, false] {
                let mut candidates: Vec<&Arc<M>> = Vec::new();
                for &(module, filter) in &scope {
                    for model in select(module) {
                        if filter.admits(model.visibility())
                            && type_matches(universe, model.types(), requested, exact)
                            && !candidates.iter().any(|c| Arc::ptr_eq(c, model))
                        {
                            candidates.push(model);
                        }
                    }
                }
                if let Some(found) = Self::unambiguous(requested, &candidates)? {
                    trace!(requested = %requested, found = %found.describe(), exact, "type resolved");
                    return Ok(Some(found.clone()));
                }
            }
        }
        Ok(None)
    }

    /// Rank-grouped ambiguity check; only the narrowest populated visibility counts
    fn unambiguous<'m, M: VisibleModel>(
        requested: &TypeName,
        candidates: &[&'m Arc<M>],
    ) -> Result<Option<&'m Arc<M>>, LookupError> {
        let Some(best) = candidates.iter().map(|c| c.visibility()).min() else {
            return Ok(None);
        };
        let ranked: Vec<&'m Arc<M>> = candidates
            .iter()
            .copied()
            .filter(|c| c.visibility() == best)
            .collect();
        match ranked.as_slice() {
            [only] => Ok(Some(*only)),
            _ => Err(LookupError::AmbiguousType {
                requested: requested.clone(),
                visibility: best,
                candidates: ranked.iter().map(|c| c.describe()).collect(),
            }),
        }
    }

    /// Every model `select` picks that matches `requested`, in scope order
    pub fn lookup_all<M, F>(&self, requested: &TypeName, select: F) -> Vec<Arc<M>>
    where
        M: VisibleModel + 'a,
        F: Fn(&'a ModuleModel) -> &'a [Arc<M>],
    {
        let universe = self.application.universe();
        let mut found: Vec<Arc<M>> = Vec::new();
        for scope in self.scopes() {
            for exact in [true, false] {
                for &(module, filter) in &scope {
                    for model in select(module) {
                        if filter.admits(model.visibility())
                            && type_matches(universe, model.types(), requested, exact)
                            && !found.iter().any(|f| Arc::ptr_eq(f, model))
                        {
                            found.push(model.clone());
                        }
                    }
                }
            }
        }
        found
    }

    /// Every service of `requested`, best match first; a service reachable
    /// from several scopes is listed once
    pub fn find_services(&self, requested: &TypeName) -> Vec<ServiceModelRef> {
        let universe = self.application.universe();
        let mut found: Vec<ServiceModelRef> = Vec::new();
        let mut add = |candidate: ServiceModelRef| {
            if !found.iter().any(|f| f.same_service(&candidate)) {
                found.push(candidate);
            }
        };
        for scope in self.scopes() {
            for exact in [true, false] {
                for &(module, filter) in &scope {
                    for service in &module.services {
                        if filter.admits(service.visibility())
                            && type_matches(universe, VisibleModel::types(service.as_ref()), requested, exact)
                        {
                            add(ServiceModelRef::Composite(service.clone()));
                        }
                    }
                    for imported in &module.imported_services {
                        if filter.admits(imported.visibility)
                            && type_matches(universe, &imported.types, requested, exact)
                        {
                            add(ServiceModelRef::Imported(imported.clone()));
                        }
                    }
                }
            }
        }
        found
    }

    /// The best service of `requested`
    pub fn find_service(&self, requested: &TypeName) -> Option<ServiceModelRef> {
        self.find_services(requested).into_iter().next()
    }
}

type Cache<V> = RwLock<HashMap<TypeName, V>>;

fn cached<V: Clone, E>(
    cache: &Cache<V>,
    key: &TypeName,
    compute: impl FnOnce() -> Result<V, E>,
) -> Result<V, E> {
    if let Some(value) = cache.read().get(key) {
        return Ok(value.clone());
    }
    let value = compute()?;
    cache.write().entry(key.clone()).or_insert(value.clone());
    Ok(value)
}

/// Lookups from one module instance, cached for the lifetime of the instance
pub struct TypeLookup {
    application: Arc<ApplicationModel>,
    module: ModuleId,
    transients: Cache<Option<Arc<CompositeDescriptor>>>,
    values: Cache<Option<Arc<CompositeDescriptor>>>,
    entities: Cache<Option<Arc<CompositeDescriptor>>>,
    all_entities: Cache<Vec<Arc<CompositeDescriptor>>>,
    objects: Cache<Option<Arc<ObjectModel>>>,
    services: Cache<Vec<ServiceModelRef>>,
}

impl TypeLookup {
    pub(crate) fn new(application: Arc<ApplicationModel>, module: ModuleId) -> Self {
        Self {
            application,
            module,
            transients: RwLock::default(),
            values: RwLock::default(),
            entities: RwLock::default(),
            all_entities: RwLock::default(),
            objects: RwLock::default(),
            services: RwLock::default(),
        }
    }

    fn scopes(&self) -> VisibleScopes<'_> {
        VisibleScopes::new(&self.application, self.module)
    }

    /// Transient composite of `type_name`
    pub fn lookup_transient(&self, type_name: &TypeName) -> Result<Option<Arc<CompositeDescriptor>>, LookupError> {
        cached(&self.transients, type_name, || {
            self.scopes().lookup(type_name, |m| m.transients.as_slice())
        })
    }

    /// Value composite of `type_name`
    pub fn lookup_value(&self, type_name: &TypeName) -> Result<Option<Arc<CompositeDescriptor>>, LookupError> {
        cached(&self.values, type_name, || self.scopes().lookup(type_name, |m| m.values.as_slice()))
    }

    /// Entity composite of `type_name`
    pub fn lookup_entity(&self, type_name: &TypeName) -> Result<Option<Arc<CompositeDescriptor>>, LookupError> {
        cached(&self.entities, type_name, || {
            self.scopes().lookup(type_name, |m| m.entities.as_slice())
        })
    }

    /// Every visible entity composite assignable to `type_name`
    pub fn lookup_entities(&self, type_name: &TypeName) -> Vec<Arc<CompositeDescriptor>> {
        cached(&self.all_entities, type_name, || {
            Ok::<_, LookupError>(self.scopes().lookup_all(type_name, |m| m.entities.as_slice()))
        })
        .unwrap_or_default()
    }

    /// Object class `type_name`
    pub fn lookup_object(&self, type_name: &TypeName) -> Result<Option<Arc<ObjectModel>>, LookupError> {
        cached(&self.objects, type_name, || self.scopes().lookup(type_name, |m| m.objects.as_slice()))
    }

    /// Best service of `type_name`
    pub fn lookup_service(&self, type_name: &TypeName) -> Option<ServiceModelRef> {
        self.lookup_services(type_name).into_iter().next()
    }

    /// Every visible service of `type_name`, best first
    pub fn lookup_services(&self, type_name: &TypeName) -> Vec<ServiceModelRef> {
        cached(&self.services, type_name, || {
            Ok::<_, LookupError>(self.scopes().find_services(type_name))
        })
        .unwrap_or_default()
    }
}
