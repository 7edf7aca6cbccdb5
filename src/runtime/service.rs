// Copyright 2025 Cowboy AI, LLC.

//! Service references and their lazily activated instances

use super::composite::{initial_state, CompositeInstance, StateBinding};
use super::injection::Uses;
use crate::errors::RuntimeError;
use crate::fragment::ServiceImporter;
use crate::structure::{LazyHandle, ModuleRef, ServiceModelRef};
use crate::types::TypeName;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// An activated service
pub enum ServiceInstance {
    /// A service composite
    Composite(CompositeInstance),
    /// An object produced by an importer
    Imported {
        /// The imported object
        instance: Arc<dyn Any + Send + Sync>,
        /// Importer that produced it, asked about availability
        importer: Arc<dyn ServiceImporter>,
    },
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceInstance::Composite(composite) => f.debug_tuple("Composite").field(composite).finish(),
            ServiceInstance::Imported { .. } => f.write_str("Imported"),
        }
    }
}

/// Handle to a service of a module
///
/// The instance is created on first use (or on application activation for
/// services instantiated on startup) and shared by every caller afterwards.
pub struct ServiceReference {
    model: ServiceModelRef,
    module: ModuleRef,
    instance: LazyHandle<ServiceInstance>,
}

impl ServiceReference {
    pub(crate) fn new(model: ServiceModelRef, module: ModuleRef) -> Self {
        Self {
            model,
            module,
            instance: LazyHandle::new(),
        }
    }

    /// Service identity
    pub fn identity(&self) -> &str {
        self.model.identity()
    }

    /// Service model
    pub fn model(&self) -> &ServiceModelRef {
        &self.model
    }

    /// Service types
    pub fn types(&self) -> &[TypeName] {
        self.model.types()
    }

    /// Whether the instance has been created
    pub fn is_active(&self) -> bool {
        self.instance.is_initialized()
    }

    /// The instance, activating the service if needed
    pub fn get(&self) -> Result<Arc<ServiceInstance>, RuntimeError> {
        self.instance.get_or_try_init(|| self.activate().map(Arc::new))
    }

    /// The service composite
    pub fn composite(&self) -> Result<CompositeInstance, RuntimeError> {
        match &*self.get()? {
            ServiceInstance::Composite(composite) => Ok(composite.clone()),
            ServiceInstance::Imported { .. } => Err(self.unavailable("imported service is not a composite")),
        }
    }

    /// The imported object, as registered under `Arc<T>`
    pub fn native<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, RuntimeError> {
        match &*self.get()? {
            ServiceInstance::Imported { instance, .. } => instance
                .downcast_ref::<Arc<T>>()
                .cloned()
                .ok_or_else(|| {
                    self.unavailable(format!("instance is not a {}", std::any::type_name::<T>()))
                }),
            ServiceInstance::Composite(_) => Err(self.unavailable("service is a composite")),
        }
    }

    /// Invoke a method of a composite service
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        Ok(self.composite()?.invoke(method, args)?)
    }

    /// Whether the service can be used
    ///
    /// Composite services are always available; imported ones ask their importer.
    pub fn is_available(&self) -> bool {
        match self.get() {
            Ok(instance) => match &*instance {
                ServiceInstance::Composite(_) => true,
                ServiceInstance::Imported { instance, importer } => importer.is_available(instance.as_ref()),
            },
            Err(_) => false,
        }
    }

    /// Drop the instance; returns whether the service was active
    pub(crate) fn passivate(&self) -> bool {
        let active = self.instance.take().is_some();
        if active {
            debug!(service = %self.identity(), "service passivated");
        }
        active
    }

    fn unavailable(&self, reason: impl Into<String>) -> RuntimeError {
        RuntimeError::ServiceUnavailable {
            identity: self.identity().to_string(),
            reason: reason.into(),
        }
    }

    fn activate(&self) -> Result<ServiceInstance, RuntimeError> {
        let module = self
            .module
            .upgrade()
            .ok_or_else(|| self.unavailable("application has been released"))?;

        let instance = match &self.model {
            ServiceModelRef::Composite(service) => {
                let descriptor = service.descriptor().clone();
                let state = StateBinding::local(initial_state(descriptor.model()));
                ServiceInstance::Composite(CompositeInstance::create(
                    descriptor,
                    &module,
                    state,
                    Uses::default(),
                )?)
            }
            ServiceModelRef::Imported(imported) => {
                let object = module
                    .model()
                    .object(imported.importer())
                    .cloned()
                    .ok_or_else(|| self.unavailable(format!("importer {} not found", imported.importer())))?;
                let importer = module
                    .instantiate_object(&object, &Uses::default())?
                    .downcast::<Arc<dyn ServiceImporter>>()
                    .map(|importer| (*importer).clone())
                    .map_err(|_| self.unavailable(format!("{} is not a service importer", imported.importer())))?;
                let instance = importer
                    .import(imported)
                    .map_err(|source| RuntimeError::Instantiation {
                        type_name: imported.types()[0].clone(),
                        source,
                    })?;
                ServiceInstance::Imported { instance, importer }
            }
        };

        info!(service = %self.identity(), module = %module.name(), "service activated");
        Ok(instance)
    }
}

impl fmt::Debug for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReference")
            .field("identity", &self.identity())
            .field("active", &self.is_active())
            .finish()
    }
}
