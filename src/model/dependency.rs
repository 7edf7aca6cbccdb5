// Copyright 2025 Cowboy AI, LLC.

//! Injected dependencies and their bind-time resolution

use crate::errors::BindingError;
use crate::structure::{ModuleId, Resolution, VisibleScopes};
use crate::types::{names, TypeName};
use serde::Serialize;
use std::sync::OnceLock;

/// Where an injected value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InjectionScope {
    /// The composite itself, viewed as another of its interfaces
    This,
    /// A value supplied to the builder creating the instance
    Uses,
    /// A service visible from the declaring module
    Service,
    /// The module, layer, application or unit of work factory
    Structure,
}

impl InjectionScope {
    /// Lowercase name for messages
    pub fn as_str(self) -> &'static str {
        match self {
            InjectionScope::This => "this",
            InjectionScope::Uses => "uses",
            InjectionScope::Service => "service",
            InjectionScope::Structure => "structure",
        }
    }
}

/// A dependency declared by a fragment or object class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyDeclaration {
    /// Name the fragment uses to ask for the value
    pub name: String,
    /// Injection scope
    pub scope: InjectionScope,
    /// Requested type
    pub injection_type: TypeName,
    /// Whether absence is acceptable
    pub optional: bool,
}

impl DependencyDeclaration {
    fn new(name: impl Into<String>, scope: InjectionScope, injection_type: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            scope,
            injection_type: injection_type.into(),
            optional: false,
        }
    }

    /// The composite viewed as `injection_type`
    pub fn this(name: impl Into<String>, injection_type: impl Into<TypeName>) -> Self {
        Self::new(name, InjectionScope::This, injection_type)
    }

    /// A builder-supplied value
    pub fn uses(name: impl Into<String>, injection_type: impl Into<TypeName>) -> Self {
        Self::new(name, InjectionScope::Uses, injection_type)
    }

    /// A visible service
    pub fn service(name: impl Into<String>, injection_type: impl Into<TypeName>) -> Self {
        Self::new(name, InjectionScope::Service, injection_type)
    }

    /// A structure object
    pub fn structure(name: impl Into<String>, injection_type: impl Into<TypeName>) -> Self {
        Self::new(name, InjectionScope::Structure, injection_type)
    }

    /// Mark as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// The service a dependency was bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceBinding {
    /// Module owning the service
    pub module: ModuleId,
    /// Service identity
    pub identity: String,
}

/// Outcome of binding a dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResolvedDependency {
    /// The composite, viewed as the type
    This(TypeName),
    /// Looked up among builder-supplied values at instantiation
    Uses(TypeName),
    /// A specific service
    Service(ServiceBinding),
    /// A structure object
    Structure(TypeName),
    /// Optional dependency with nothing to inject
    Absent,
}

/// A dependency of one model, bound once during the binding pass
#[derive(Debug)]
pub struct DependencyModel {
    declaration: DependencyDeclaration,
    resolved: OnceLock<ResolvedDependency>,
}

impl DependencyModel {
    pub(crate) fn new(declaration: DependencyDeclaration) -> Self {
        Self {
            declaration,
            resolved: OnceLock::new(),
        }
    }

    /// The declaration
    pub fn declaration(&self) -> &DependencyDeclaration {
        &self.declaration
    }

    /// Dependency name
    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    /// Injection scope
    pub fn scope(&self) -> InjectionScope {
        self.declaration.scope
    }

    /// Requested type
    pub fn injection_type(&self) -> &TypeName {
        &self.declaration.injection_type
    }

    /// Resolution, once bound
    pub fn resolved(&self) -> Option<&ResolvedDependency> {
        self.resolved.get()
    }

    /// Resolve against the module of `resolution`
    pub(crate) fn bind(&self, resolution: &Resolution<'_>) -> Result<(), BindingError> {
        if self.resolved.get().is_some() {
            return Ok(());
        }
        let model_name = resolution.model_name();
        let resolved = match self.declaration.scope {
            InjectionScope::This => {
                let implemented = resolution
                    .composite()
                    .is_some_and(|c| c.implements(&self.declaration.injection_type, resolution.application.universe()));
                if !implemented {
                    return Err(BindingError::ThisNotImplemented {
                        name: self.declaration.name.clone(),
                        injection_type: self.declaration.injection_type.clone(),
                        model: model_name,
                    });
                }
                ResolvedDependency::This(self.declaration.injection_type.clone())
            }
            InjectionScope::Uses => ResolvedDependency::Uses(self.declaration.injection_type.clone()),
            InjectionScope::Service => {
                let scopes = VisibleScopes::new(resolution.application, resolution.module.id());
                match scopes.find_service(&self.declaration.injection_type) {
                    Some(service) => ResolvedDependency::Service(ServiceBinding {
                        module: service.module(),
                        identity: service.identity().to_string(),
                    }),
                    None if self.declaration.optional => ResolvedDependency::Absent,
                    None => {
                        return Err(BindingError::UnresolvedDependency {
                            scope: self.declaration.scope.as_str(),
                            name: self.declaration.name.clone(),
                            injection_type: self.declaration.injection_type.clone(),
                            model: model_name,
                            module: resolution.module.name().to_string(),
                        })
                    }
                }
            }
            InjectionScope::Structure => {
                let known = [
                    names::STRUCTURE_MODULE,
                    names::STRUCTURE_LAYER,
                    names::STRUCTURE_APPLICATION,
                    names::STRUCTURE_UNIT_OF_WORK_FACTORY,
                ];
                if !known.contains(&self.declaration.injection_type.as_str()) {
                    return Err(BindingError::UnknownStructure {
                        name: self.declaration.name.clone(),
                        injection_type: self.declaration.injection_type.clone(),
                        model: model_name,
                    });
                }
                ResolvedDependency::Structure(self.declaration.injection_type.clone())
            }
        };
        let _ = self.resolved.set(resolved);
        Ok(())
    }
}
