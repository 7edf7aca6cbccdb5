// Copyright 2025 Cowboy AI, LLC.

//! Values handed to fragment and object factories

use super::composite::{CompositeInstance, CompositeRef};
use super::service::ServiceReference;
use crate::errors::RuntimeError;
use crate::model::{DependencyModel, InjectionScope, ResolvedDependency};
use crate::structure::{Application, Layer, Module};
use crate::types::{names, TypeName};
use crate::unitofwork::UnitOfWorkFactory;
use anyhow::{anyhow, bail, Context as _};
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Builder-supplied values for uses-scoped dependencies, keyed by type
#[derive(Clone, Default)]
pub struct Uses {
    values: IndexMap<TypeName, Arc<dyn Any + Send + Sync>>,
}

impl Uses {
    /// No values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with<T: Any + Send + Sync>(mut self, type_name: impl Into<TypeName>, value: T) -> Self {
        self.insert(type_name, value);
        self
    }

    /// Supply `value` for dependencies of `type_name`
    pub fn insert<T: Any + Send + Sync>(&mut self, type_name: impl Into<TypeName>, value: T) -> &mut Self {
        self.values.insert(type_name.into(), Arc::new(value));
        self
    }

    /// Value supplied for `type_name`, if it has type `T`
    pub fn get<T: Any + Send + Sync>(&self, type_name: &str) -> Option<Arc<T>> {
        self.values.get(type_name)?.clone().downcast::<T>().ok()
    }

    /// Whether a value is supplied for `type_name`
    pub fn contains(&self, type_name: &str) -> bool {
        self.values.contains_key(type_name)
    }

    /// Copy every value of `other`, replacing existing ones
    pub fn merge(&mut self, other: &Uses) {
        for (type_name, value) in &other.values {
            self.values.insert(type_name.clone(), value.clone());
        }
    }

    /// Check that every mandatory uses-dependency of `owner` is supplied
    pub(crate) fn check(&self, owner: &TypeName, dependencies: &[DependencyModel]) -> Result<(), RuntimeError> {
        for dependency in dependencies {
            if dependency.scope() == InjectionScope::Uses
                && !dependency.declaration().optional
                && !self.contains(dependency.injection_type())
            {
                return Err(RuntimeError::MissingUses {
                    type_name: owner.clone(),
                    injection_type: dependency.injection_type().clone(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Uses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// Structure objects available to structure-scoped dependencies
#[derive(Debug, Clone)]
pub enum Structure {
    /// The declaring module
    Module(Module),
    /// The layer of the declaring module
    Layer(Layer),
    /// The application
    Application(Application),
    /// Unit of work factory of the declaring module
    UnitOfWorkFactory(UnitOfWorkFactory),
}

/// Injection context of one fragment or object being created
///
/// Dependencies are looked up by the name they were declared with and
/// answered from the resolution made during binding.
pub struct InjectionContext<'a> {
    module: &'a Module,
    this: Option<&'a CompositeInstance>,
    dependencies: &'a [DependencyModel],
    uses: &'a Uses,
    owner: &'a TypeName,
}

impl<'a> InjectionContext<'a> {
    pub(crate) fn new(
        module: &'a Module,
        this: Option<&'a CompositeInstance>,
        dependencies: &'a [DependencyModel],
        uses: &'a Uses,
        owner: &'a TypeName,
    ) -> Self {
        Self {
            module,
            this,
            dependencies,
            uses,
            owner,
        }
    }

    /// Module of the composite or object
    pub fn module(&self) -> &Module {
        self.module
    }

    /// Fragment or object class being created
    pub fn owner(&self) -> &TypeName {
        self.owner
    }

    fn dependency(&self, name: &str, scope: InjectionScope) -> anyhow::Result<&'a DependencyModel> {
        self.dependencies
            .iter()
            .find(|d| d.name() == name && d.scope() == scope)
            .ok_or_else(|| anyhow!("{} declares no {} dependency {name}", self.owner, scope.as_str()))
    }

    /// The composite being created
    pub fn this(&self) -> anyhow::Result<CompositeRef> {
        self.this
            .map(CompositeInstance::downgrade)
            .ok_or_else(|| anyhow!("{} is not part of a composite", self.owner))
    }

    /// The composite viewed as the type of this-dependency `name`
    pub fn this_as(&self, name: &str) -> anyhow::Result<CompositeRef> {
        let dependency = self.dependency(name, InjectionScope::This)?;
        let this = self.this()?;
        match dependency.resolved() {
            Some(ResolvedDependency::This(view)) => Ok(this.view_as(view.clone())),
            _ => bail!("this dependency {name} of {} is not bound", self.owner),
        }
    }

    /// Service bound to dependency `name`
    pub fn service(&self, name: &str) -> anyhow::Result<Arc<ServiceReference>> {
        self.optional_service(name)?
            .ok_or_else(|| anyhow!("optional service {name} of {} is absent", self.owner))
    }

    /// Service bound to dependency `name`, `None` when an optional one is absent
    pub fn optional_service(&self, name: &str) -> anyhow::Result<Option<Arc<ServiceReference>>> {
        let dependency = self.dependency(name, InjectionScope::Service)?;
        match dependency.resolved() {
            Some(ResolvedDependency::Service(binding)) => {
                let service = self
                    .module
                    .service_in(binding.module, &binding.identity)
                    .ok_or_else(|| RuntimeError::ServiceUnavailable {
                        identity: binding.identity.clone(),
                        reason: "no longer part of the application".to_string(),
                    })?;
                Ok(Some(service))
            }
            Some(ResolvedDependency::Absent) => Ok(None),
            _ => bail!("service dependency {name} of {} is not bound", self.owner),
        }
    }

    /// Builder-supplied value of dependency `name`
    pub fn uses<T: Any + Send + Sync>(&self, name: &str) -> anyhow::Result<Arc<T>> {
        self.optional_uses(name)?.ok_or_else(|| {
            RuntimeError::MissingUses {
                type_name: self.owner.clone(),
                injection_type: self
                    .dependencies
                    .iter()
                    .find(|d| d.name() == name)
                    .map(|d| d.injection_type().clone())
                    .unwrap_or_else(|| TypeName::new(name)),
            }
            .into()
        })
    }

    /// Builder-supplied value of dependency `name`, if any
    pub fn optional_uses<T: Any + Send + Sync>(&self, name: &str) -> anyhow::Result<Option<Arc<T>>> {
        let dependency = self.dependency(name, InjectionScope::Uses)?;
        if !self.uses.contains(dependency.injection_type()) {
            return Ok(None);
        }
        self.uses
            .get::<T>(dependency.injection_type())
            .map(Some)
            .with_context(|| {
                format!(
                    "uses value {} of {} has an unexpected type",
                    dependency.injection_type(),
                    self.owner
                )
            })
    }

    /// Structure object of dependency `name`
    pub fn structure(&self, name: &str) -> anyhow::Result<Structure> {
        let dependency = self.dependency(name, InjectionScope::Structure)?;
        let application = self.module.application();
        Ok(match dependency.injection_type().as_str() {
            names::STRUCTURE_MODULE => Structure::Module(self.module.clone()),
            names::STRUCTURE_LAYER => Structure::Layer(self.module.layer()),
            names::STRUCTURE_APPLICATION => Structure::Application(application),
            names::STRUCTURE_UNIT_OF_WORK_FACTORY => {
                Structure::UnitOfWorkFactory(self.module.unit_of_work_factory())
            }
            other => bail!("{other} is not a structure type"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DependencyDeclaration;

    #[derive(Debug, PartialEq)]
    struct Clock(u64);

    #[test]
    fn test_uses_are_typed() {
        let uses = Uses::new().with("Clock", Clock(7)).with("Name", "x".to_string());
        assert_eq!(uses.get::<Clock>("Clock").as_deref(), Some(&Clock(7)));
        assert!(uses.get::<String>("Clock").is_none());
        assert!(uses.get::<Clock>("Missing").is_none());
        assert!(uses.contains("Name"));
    }

    #[test]
    fn test_missing_mandatory_uses_is_reported() {
        let dependencies = vec![
            DependencyModel::new(DependencyDeclaration::uses("clock", "Clock")),
            DependencyModel::new(DependencyDeclaration::uses("name", "Name").optional()),
        ];
        let owner = TypeName::new("Timer");
        let err = Uses::new().check(&owner, &dependencies).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No uses value of type Clock supplied for Timer"
        );
        assert!(Uses::new().with("Clock", Clock(1)).check(&owner, &dependencies).is_ok());
    }
}
