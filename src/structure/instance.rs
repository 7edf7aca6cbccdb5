// Copyright 2025 Cowboy AI, LLC.

//! Running application: modules, their services and SPI ports
//!
//! An [`Application`] is created from a bound [`ApplicationModel`]. Each
//! module gets a [`TypeLookup`] and one [`ServiceReference`] per service it
//! declares. Services are activated lazily, or on
//! [`activate`](Application::activate) when instantiated on startup.

use super::lazy::LazyHandle;
use super::lookup::{ServiceModelRef, TypeLookup};
use super::model::{ApplicationModel, LayerModel, ModuleId, ModuleModel, ObjectModel};
use crate::errors::RuntimeError;
use crate::runtime::{
    CompositeInstance, InjectionContext, ServiceReference, TransientBuilder, Uses, ValueBuilder,
};
use crate::spi::{
    EntityFinder, EntityStore, IdentityGenerator, MetricsProvider, NoopMetricsProvider,
    ValueSerialization,
};
use crate::types::{names, TypeName};
use crate::unitofwork::{UnitOfWork, UnitOfWorkFactory};
use indexmap::IndexMap;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::info;

pub(crate) struct ApplicationInner {
    model: Arc<ApplicationModel>,
    modules: Vec<Vec<ModuleInner>>,
}

struct ModuleInner {
    type_lookup: TypeLookup,
    services: IndexMap<String, Arc<ServiceReference>>,
    entity_store: LazyHandle<dyn EntityStore>,
    identity_generator: LazyHandle<dyn IdentityGenerator>,
    value_serialization: LazyHandle<dyn ValueSerialization>,
    metrics_provider: LazyHandle<dyn MetricsProvider>,
    entity_finder: LazyHandle<dyn EntityFinder>,
}

impl ModuleInner {
    fn new(application: &Weak<ApplicationInner>, model: &Arc<ApplicationModel>, module: &ModuleModel) -> Self {
        let reference = ModuleRef {
            application: application.clone(),
            id: module.id,
        };
        let services = module
            .services
            .iter()
            .cloned()
            .map(ServiceModelRef::Composite)
            .chain(module.imported_services.iter().cloned().map(ServiceModelRef::Imported))
            .map(|service| {
                (
                    service.identity().to_string(),
                    Arc::new(ServiceReference::new(service, reference.clone())),
                )
            })
            .collect();
        Self {
            type_lookup: TypeLookup::new(model.clone(), module.id),
            services,
            entity_store: LazyHandle::new(),
            identity_generator: LazyHandle::new(),
            value_serialization: LazyHandle::new(),
            metrics_provider: LazyHandle::new(),
            entity_finder: LazyHandle::new(),
        }
    }
}

/// A running application
#[derive(Clone)]
pub struct Application {
    inner: Arc<ApplicationInner>,
}

impl Application {
    pub(crate) fn new(model: Arc<ApplicationModel>) -> Self {
        let inner = Arc::new_cyclic(|weak| {
            let modules = model
                .layers
                .iter()
                .map(|layer| {
                    layer
                        .modules
                        .iter()
                        .map(|module| ModuleInner::new(weak, &model, module))
                        .collect()
                })
                .collect();
            ApplicationInner { model, modules }
        });
        Self { inner }
    }

    /// The application model
    pub fn model(&self) -> &Arc<ApplicationModel> {
        &self.inner.model
    }

    /// Application name
    pub fn name(&self) -> &str {
        self.inner.model.name()
    }

    /// Layers in declaration order
    pub fn layers(&self) -> Vec<Layer> {
        (0..self.inner.model.layers.len())
            .map(|index| Layer {
                application: self.clone(),
                index,
            })
            .collect()
    }

    /// Layer by name
    pub fn layer(&self, name: &str) -> Option<Layer> {
        self.inner.model.layer(name).map(|layer| Layer {
            application: self.clone(),
            index: layer.index,
        })
    }

    /// Module by layer and module name
    pub fn module(&self, layer: &str, module: &str) -> Option<Module> {
        let model = self.inner.model.find_module(layer, module)?;
        Some(Module {
            application: self.inner.clone(),
            id: model.id,
        })
    }

    fn modules(&self) -> impl Iterator<Item = &ModuleInner> {
        self.inner.modules.iter().flatten()
    }

    /// Create every service instantiated on startup
    pub fn activate(&self) -> Result<(), RuntimeError> {
        let mut activated = 0;
        for module in self.modules() {
            for service in module.services.values() {
                let on_startup = match service.model() {
                    ServiceModelRef::Composite(model) => model.instantiate_on_startup(),
                    ServiceModelRef::Imported(model) => model.instantiate_on_startup(),
                };
                if on_startup {
                    service.get()?;
                    activated += 1;
                }
            }
        }
        info!(application = %self.name(), services = activated, "application activated");
        Ok(())
    }

    /// Release every service instance
    pub fn passivate(&self) {
        let passivated = self
            .modules()
            .flat_map(|module| module.services.values())
            .filter(|service| service.passivate())
            .count();
        info!(application = %self.name(), services = passivated, "application passivated");
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application").field("name", &self.name()).finish()
    }
}

/// A layer of a running application
#[derive(Clone)]
pub struct Layer {
    application: Application,
    index: usize,
}

impl Layer {
    /// Layer model
    pub fn model(&self) -> &LayerModel {
        &self.application.inner.model.layers[self.index]
    }

    /// Layer name
    pub fn name(&self) -> &str {
        self.model().name()
    }

    /// Modules in declaration order
    pub fn modules(&self) -> Vec<Module> {
        self.model()
            .modules
            .iter()
            .map(|module| Module {
                application: self.application.inner.clone(),
                id: module.id,
            })
            .collect()
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer").field("name", &self.name()).finish()
    }
}

/// Weak module handle held by composites and service references
#[derive(Clone)]
pub(crate) struct ModuleRef {
    application: Weak<ApplicationInner>,
    id: ModuleId,
}

impl ModuleRef {
    pub(crate) fn upgrade(&self) -> Option<Module> {
        self.application.upgrade().map(|application| Module {
            application,
            id: self.id,
        })
    }
}

/// A module of a running application
///
/// Everything created through a module sees types and services according
/// to that module's visibility rules.
#[derive(Clone)]
pub struct Module {
    application: Arc<ApplicationInner>,
    id: ModuleId,
}

impl Module {
    fn inner(&self) -> &ModuleInner {
        &self.application.modules[self.id.layer][self.id.module]
    }

    /// Position in the application
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Module model
    pub fn model(&self) -> &ModuleModel {
        &self.application.model.layers[self.id.layer].modules[self.id.module]
    }

    /// Module name
    pub fn name(&self) -> &str {
        self.model().name()
    }

    /// Layer of the module
    pub fn layer(&self) -> Layer {
        Layer {
            application: self.application(),
            index: self.id.layer,
        }
    }

    /// The application
    pub fn application(&self) -> Application {
        Application {
            inner: self.application.clone(),
        }
    }

    /// Model of the application
    pub fn application_model(&self) -> &Arc<ApplicationModel> {
        &self.application.model
    }

    pub(crate) fn downgrade(&self) -> ModuleRef {
        ModuleRef {
            application: Arc::downgrade(&self.application),
            id: self.id,
        }
    }

    /// Visibility-aware lookup of this module
    pub fn type_lookup(&self) -> &TypeLookup {
        &self.inner().type_lookup
    }

    fn no_such_type(&self, kind: &'static str, type_name: TypeName) -> RuntimeError {
        RuntimeError::NoSuchType {
            kind,
            type_name,
            module: self.name().to_string(),
        }
    }

    /// Builder for a visible transient composite
    pub fn new_transient_builder(&self, type_name: impl Into<TypeName>) -> Result<TransientBuilder, RuntimeError> {
        let type_name = type_name.into();
        let descriptor = self
            .type_lookup()
            .lookup_transient(&type_name)?
            .ok_or_else(|| self.no_such_type("transient", type_name))?;
        let owner = self.model_module(descriptor.module());
        Ok(TransientBuilder::new(owner, descriptor))
    }

    /// A transient composite with default state
    pub fn new_transient(&self, type_name: impl Into<TypeName>) -> Result<CompositeInstance, RuntimeError> {
        self.new_transient_builder(type_name)?.new_instance()
    }

    /// Builder for a visible value composite
    pub fn new_value_builder(&self, type_name: impl Into<TypeName>) -> Result<ValueBuilder, RuntimeError> {
        let type_name = type_name.into();
        let descriptor = self
            .type_lookup()
            .lookup_value(&type_name)?
            .ok_or_else(|| self.no_such_type("value", type_name))?;
        let owner = self.model_module(descriptor.module());
        Ok(ValueBuilder::new(owner, descriptor))
    }

    /// A value composite parsed with the visible value serialization
    pub fn new_value_from_serialized_state(
        &self,
        type_name: impl Into<TypeName>,
        text: &str,
    ) -> Result<CompositeInstance, RuntimeError> {
        let type_name = type_name.into();
        let state = self.value_serialization()?.deserialize(&type_name, text)?;
        let mut builder = self.new_value_builder(type_name)?;
        if let Value::Object(state) = &state {
            builder.set_all(state);
        }
        builder.new_instance()
    }

    /// Text form of a composite's state
    pub fn value_to_string(&self, value: &CompositeInstance) -> Result<String, RuntimeError> {
        self.value_serialization()?.serialize(&value.state_object())
    }

    /// Create an instance of a visible object class
    pub fn new_object(&self, class: impl Into<TypeName>, uses: &Uses) -> Result<Arc<dyn Any + Send + Sync>, RuntimeError> {
        let class = class.into();
        let object = self
            .type_lookup()
            .lookup_object(&class)?
            .ok_or_else(|| self.no_such_type("object", class))?;
        self.model_module(object.module).instantiate_object(&object, uses)
    }

    /// Create an object and downcast it to `T`
    pub fn new_object_as<T: Any + Send + Sync>(&self, class: impl Into<TypeName>, uses: &Uses) -> Result<Arc<T>, RuntimeError> {
        let class = class.into();
        self.new_object(class.clone(), uses)?
            .downcast::<T>()
            .map_err(|_| RuntimeError::Instantiation {
                type_name: class,
                source: anyhow::anyhow!("object is not a {}", std::any::type_name::<T>()),
            })
    }

    pub(crate) fn instantiate_object(
        &self,
        object: &ObjectModel,
        uses: &Uses,
    ) -> Result<Arc<dyn Any + Send + Sync>, RuntimeError> {
        uses.check(object.name(), object.dependencies())?;
        let context = InjectionContext::new(self, None, object.dependencies(), uses, object.name());
        (object.class().factory())(&context).map_err(|source| RuntimeError::Instantiation {
            type_name: object.name().clone(),
            source,
        })
    }

    pub(crate) fn model_module(&self, id: ModuleId) -> Module {
        Module {
            application: self.application.clone(),
            id,
        }
    }

    /// Best visible service of `type_name`
    pub fn find_service(&self, type_name: impl Into<TypeName>) -> Result<Arc<ServiceReference>, RuntimeError> {
        let type_name = type_name.into();
        self.type_lookup()
            .lookup_service(&type_name)
            .and_then(|model| self.service_in(model.module(), model.identity()))
            .ok_or_else(|| self.no_such_type("service", type_name))
    }

    /// Every visible service of `type_name`, narrowest scope first
    pub fn find_services(&self, type_name: impl Into<TypeName>) -> Vec<Arc<ServiceReference>> {
        self.type_lookup()
            .lookup_services(&type_name.into())
            .iter()
            .filter_map(|model| self.service_in(model.module(), model.identity()))
            .collect()
    }

    /// Service declared in this module with `identity`
    pub fn service(&self, identity: &str) -> Option<Arc<ServiceReference>> {
        self.inner().services.get(identity).cloned()
    }

    pub(crate) fn service_in(&self, module: ModuleId, identity: &str) -> Option<Arc<ServiceReference>> {
        self.application
            .modules
            .get(module.layer)?
            .get(module.module)?
            .services
            .get(identity)
            .cloned()
    }

    fn port<T: ?Sized + Send + Sync + 'static>(&self, port: &str) -> Result<Arc<T>, RuntimeError> {
        self.find_service(port)?.native::<T>()
    }

    /// Visible entity store
    pub fn entity_store(&self) -> Result<Arc<dyn EntityStore>, RuntimeError> {
        self.inner()
            .entity_store
            .get_or_try_init(|| self.port::<dyn EntityStore>(names::ENTITY_STORE))
    }

    /// Visible identity generator
    pub fn identity_generator(&self) -> Result<Arc<dyn IdentityGenerator>, RuntimeError> {
        self.inner()
            .identity_generator
            .get_or_try_init(|| self.port::<dyn IdentityGenerator>(names::IDENTITY_GENERATOR))
    }

    /// Visible value serialization
    pub fn value_serialization(&self) -> Result<Arc<dyn ValueSerialization>, RuntimeError> {
        self.inner()
            .value_serialization
            .get_or_try_init(|| self.port::<dyn ValueSerialization>(names::VALUE_SERIALIZATION))
    }

    /// Visible entity finder
    pub fn entity_finder(&self) -> Result<Arc<dyn EntityFinder>, RuntimeError> {
        self.inner()
            .entity_finder
            .get_or_try_init(|| self.port::<dyn EntityFinder>(names::ENTITY_FINDER))
    }

    /// Visible metrics provider; a no-op provider when there is none
    pub fn metrics_provider(&self) -> Arc<dyn MetricsProvider> {
        let resolved = self.inner().metrics_provider.get_or_try_init(|| {
            Ok::<_, RuntimeError>(
                self.port::<dyn MetricsProvider>(names::METRICS_PROVIDER)
                    .unwrap_or_else(|_| Arc::new(NoopMetricsProvider) as Arc<dyn MetricsProvider>),
            )
        });
        resolved.unwrap_or_else(|_| Arc::new(NoopMetricsProvider) as Arc<dyn MetricsProvider>)
    }

    /// Unit of work factory of this module
    pub fn unit_of_work_factory(&self) -> UnitOfWorkFactory {
        UnitOfWorkFactory::new(self.clone())
    }

    /// Start a unit of work with the default usecase
    pub fn new_unit_of_work(&self) -> UnitOfWork {
        self.unit_of_work_factory().new_unit_of_work()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("layer", &self.layer().name())
            .field("name", &self.name())
            .finish()
    }
}
