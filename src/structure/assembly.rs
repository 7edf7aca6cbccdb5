// Copyright 2025 Cowboy AI, LLC.

//! Declarative assemblies: Application → Layer → Module → declarations
//!
//! Assemblies are mutable collections of declarations. They are turned into
//! an immutable [`ApplicationModel`](super::ApplicationModel) by the
//! [`ApplicationModelFactory`](super::ApplicationModelFactory).

use crate::config::{ApplicationConfig, ApplicationMode};
use crate::meta_info::MetaInfo;
use crate::model::{CompositeDeclaration, CompositeKind, StateDeclaration, StateDeclarations};
use crate::spi::{EntityFinder, EntityStore, IdentityGenerator, MetricsProvider, ValueSerialization};
use crate::types::{names, TypeName, TypeUniverse, Visibility};
use std::any::Any;
use std::sync::Arc;

/// Root assembly of an application
#[derive(Debug)]
pub struct ApplicationAssembly {
    pub(crate) universe: Arc<TypeUniverse>,
    pub(crate) config: ApplicationConfig,
    pub(crate) layers: Vec<LayerAssembly>,
    pub(crate) meta_info: MetaInfo,
}

impl ApplicationAssembly {
    /// Assembly named `name` over `universe`
    pub fn new(name: impl Into<String>, universe: Arc<TypeUniverse>) -> Self {
        Self::from_config(ApplicationConfig::named(name), universe)
    }

    /// Assembly seeded from a configuration
    pub fn from_config(config: ApplicationConfig, universe: Arc<TypeUniverse>) -> Self {
        Self {
            universe,
            config,
            layers: Vec::new(),
            meta_info: MetaInfo::new(),
        }
    }

    /// Application name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Set the version
    pub fn set_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.config.version = version.into();
        self
    }

    /// Set the run mode
    pub fn set_mode(&mut self, mode: ApplicationMode) -> &mut Self {
        self.config.mode = mode;
        self
    }

    /// Attach application meta info
    pub fn set_meta_info<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.meta_info.set(value);
        self
    }

    /// The type universe
    pub fn universe(&self) -> &Arc<TypeUniverse> {
        &self.universe
    }

    /// The configuration
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Layer named `name`, created on first use
    pub fn layer(&mut self, name: &str) -> &mut LayerAssembly {
        match self.layers.iter().position(|l| l.name == name) {
            Some(index) => &mut self.layers[index],
            None => {
                self.layers.push(LayerAssembly::new(name));
                let last = self.layers.len() - 1;
                &mut self.layers[last]
            }
        }
    }

    /// Layers in declaration order
    pub fn layers(&self) -> &[LayerAssembly] {
        &self.layers
    }
}

/// A layer and the names of the layers it uses
#[derive(Debug)]
pub struct LayerAssembly {
    pub(crate) name: String,
    pub(crate) uses: Vec<String>,
    pub(crate) modules: Vec<ModuleAssembly>,
    pub(crate) meta_info: MetaInfo,
}

impl LayerAssembly {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            uses: Vec::new(),
            modules: Vec::new(),
            meta_info: MetaInfo::new(),
        }
    }

    /// Layer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare that this layer uses `layer`
    pub fn uses(&mut self, layer: &str) -> &mut Self {
        if !self.uses.iter().any(|u| u == layer) {
            self.uses.push(layer.to_string());
        }
        self
    }

    /// Attach layer meta info
    pub fn set_meta_info<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.meta_info.set(value);
        self
    }

    /// Module named `name`, created on first use
    pub fn module(&mut self, name: &str) -> &mut ModuleAssembly {
        match self.modules.iter().position(|m| m.name == name) {
            Some(index) => &mut self.modules[index],
            None => {
                self.modules.push(ModuleAssembly::new(name));
                let last = self.modules.len() - 1;
                &mut self.modules[last]
            }
        }
    }

    /// Modules in declaration order
    pub fn modules(&self) -> &[ModuleAssembly] {
        &self.modules
    }
}

/// Declarations of one module
#[derive(Debug)]
pub struct ModuleAssembly {
    pub(crate) name: String,
    pub(crate) transients: Vec<CompositeAssembly>,
    pub(crate) values: Vec<CompositeAssembly>,
    pub(crate) entities: Vec<CompositeAssembly>,
    pub(crate) services: Vec<ServiceAssembly>,
    pub(crate) imported_services: Vec<ImportedServiceAssembly>,
    pub(crate) objects: Vec<ObjectAssembly>,
    pub(crate) state: StateDeclarations,
    pub(crate) meta_info: MetaInfo,
}

impl ModuleAssembly {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transients: Vec::new(),
            values: Vec::new(),
            entities: Vec::new(),
            services: Vec::new(),
            imported_services: Vec::new(),
            objects: Vec::new(),
            state: StateDeclarations::default(),
            meta_info: MetaInfo::new(),
        }
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach module meta info
    pub fn set_meta_info<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.meta_info.set(value);
        self
    }

    /// Declare a transient composite
    pub fn transient(&mut self, primary: impl Into<TypeName>) -> &mut CompositeAssembly {
        self.transients
            .push(CompositeAssembly::new(CompositeKind::Transient, primary));
        let last = self.transients.len() - 1;
        &mut self.transients[last]
    }

    /// Declare a value composite
    pub fn value(&mut self, primary: impl Into<TypeName>) -> &mut CompositeAssembly {
        self.values
            .push(CompositeAssembly::new(CompositeKind::Value, primary));
        let last = self.values.len() - 1;
        &mut self.values[last]
    }

    /// Declare an entity composite
    pub fn entity(&mut self, primary: impl Into<TypeName>) -> &mut CompositeAssembly {
        self.entities
            .push(CompositeAssembly::new(CompositeKind::Entity, primary));
        let last = self.entities.len() - 1;
        &mut self.entities[last]
    }

    /// Declare a service composite
    pub fn service(&mut self, primary: impl Into<TypeName>) -> &mut ServiceAssembly {
        self.services.push(ServiceAssembly {
            composite: CompositeAssembly::new(CompositeKind::Service, primary),
            identity: None,
            instantiate_on_startup: false,
        });
        let last = self.services.len() - 1;
        &mut self.services[last]
    }

    /// Declare a service implemented outside the composite model
    pub fn imported_service(&mut self, service_type: impl Into<TypeName>) -> &mut ImportedServiceAssembly {
        self.imported_services
            .push(ImportedServiceAssembly::new(service_type.into()));
        let last = self.imported_services.len() - 1;
        &mut self.imported_services[last]
    }

    /// Declare an object class
    pub fn object(&mut self, class: impl Into<TypeName>) -> &mut ObjectAssembly {
        self.objects.push(ObjectAssembly {
            class: class.into(),
            visibility: Visibility::Module,
        });
        let last = self.objects.len() - 1;
        &mut self.objects[last]
    }

    /// Refine a state slot by accessor name or `Type:name`
    pub fn declare_state(&mut self, name: impl Into<String>, declaration: StateDeclaration) -> &mut Self {
        self.state.declare(name, declaration);
        self
    }

    /// Import a native port implementation as a service of `port_type`
    pub fn import_port<T>(&mut self, port_type: &str, instance: Arc<T>) -> &mut ImportedServiceAssembly
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.imported_service(port_type).with_instance(instance)
    }

    /// Import an entity store
    pub fn entity_store(&mut self, store: Arc<dyn EntityStore>) -> &mut ImportedServiceAssembly {
        self.import_port(names::ENTITY_STORE, store)
    }

    /// Import an identity generator
    pub fn identity_generator(&mut self, generator: Arc<dyn IdentityGenerator>) -> &mut ImportedServiceAssembly {
        self.import_port(names::IDENTITY_GENERATOR, generator)
    }

    /// Import a value serialization
    pub fn value_serialization(&mut self, serialization: Arc<dyn ValueSerialization>) -> &mut ImportedServiceAssembly {
        self.import_port(names::VALUE_SERIALIZATION, serialization)
    }

    /// Import a metrics provider
    pub fn metrics_provider(&mut self, provider: Arc<dyn MetricsProvider>) -> &mut ImportedServiceAssembly {
        self.import_port(names::METRICS_PROVIDER, provider)
    }

    /// Import an entity finder
    pub fn entity_finder(&mut self, finder: Arc<dyn EntityFinder>) -> &mut ImportedServiceAssembly {
        self.import_port(names::ENTITY_FINDER, finder)
    }
}

/// Builder methods shared by composite and service declarations
pub trait CompositeAssembler {
    /// The underlying declaration
    fn declaration_mut(&mut self) -> &mut CompositeDeclaration;

    /// The declared visibility
    fn visibility_mut(&mut self) -> &mut Visibility;

    /// Add types to the type set
    fn with_types<I, T>(&mut self, types: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
        Self: Sized,
    {
        let declaration = self.declaration_mut();
        for t in types {
            let t = t.into();
            if !declaration.types.contains(&t) {
                declaration.types.push(t);
            }
        }
        self
    }

    /// Add mixins, tried before any discovered from the types
    fn with_mixins<I, T>(&mut self, mixins: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
        Self: Sized,
    {
        self.declaration_mut()
            .mixins
            .extend(mixins.into_iter().map(Into::into));
        self
    }

    /// Add concerns
    fn with_concerns<I, T>(&mut self, concerns: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
        Self: Sized,
    {
        self.declaration_mut()
            .concerns
            .extend(concerns.into_iter().map(Into::into));
        self
    }

    /// Add side-effects
    fn with_side_effects<I, T>(&mut self, side_effects: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
        Self: Sized,
    {
        self.declaration_mut()
            .side_effects
            .extend(side_effects.into_iter().map(Into::into));
        self
    }

    /// Add constraint classes
    fn with_constraints<I, T>(&mut self, constraints: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
        Self: Sized,
    {
        self.declaration_mut()
            .constraints
            .extend(constraints.into_iter().map(Into::into));
        self
    }

    /// Set the visibility
    fn visible_in(&mut self, visibility: Visibility) -> &mut Self
    where
        Self: Sized,
    {
        *self.visibility_mut() = visibility;
        self
    }

    /// Attach meta info
    fn set_meta_info<V: Any + Send + Sync>(&mut self, value: V) -> &mut Self
    where
        Self: Sized,
    {
        self.declaration_mut().meta_info.set(value);
        self
    }
}

/// Declaration of a transient, value or entity composite
#[derive(Debug)]
pub struct CompositeAssembly {
    pub(crate) declaration: CompositeDeclaration,
    pub(crate) visibility: Visibility,
}

impl CompositeAssembly {
    fn new(kind: CompositeKind, primary: impl Into<TypeName>) -> Self {
        Self {
            declaration: CompositeDeclaration::new(kind, [primary.into()]),
            visibility: Visibility::Module,
        }
    }

    /// The declaration so far
    pub fn declaration(&self) -> &CompositeDeclaration {
        &self.declaration
    }
}

impl CompositeAssembler for CompositeAssembly {
    fn declaration_mut(&mut self) -> &mut CompositeDeclaration {
        &mut self.declaration
    }

    fn visibility_mut(&mut self) -> &mut Visibility {
        &mut self.visibility
    }
}

/// Declaration of a service composite
#[derive(Debug)]
pub struct ServiceAssembly {
    pub(crate) composite: CompositeAssembly,
    pub(crate) identity: Option<String>,
    pub(crate) instantiate_on_startup: bool,
}

impl ServiceAssembly {
    /// Set the service identity
    pub fn identified_by(&mut self, identity: impl Into<String>) -> &mut Self {
        self.identity = Some(identity.into());
        self
    }

    /// Instantiate when the application is activated instead of on first use
    pub fn instantiate_on_startup(&mut self) -> &mut Self {
        self.instantiate_on_startup = true;
        self
    }
}

impl CompositeAssembler for ServiceAssembly {
    fn declaration_mut(&mut self) -> &mut CompositeDeclaration {
        &mut self.composite.declaration
    }

    fn visibility_mut(&mut self) -> &mut Visibility {
        &mut self.composite.visibility
    }
}

/// Declaration of an imported service
#[derive(Debug)]
pub struct ImportedServiceAssembly {
    pub(crate) types: Vec<TypeName>,
    pub(crate) identity: Option<String>,
    pub(crate) importer: TypeName,
    pub(crate) instance: Option<Arc<dyn Any + Send + Sync>>,
    pub(crate) visibility: Visibility,
    pub(crate) instantiate_on_startup: bool,
    pub(crate) meta_info: MetaInfo,
}

impl ImportedServiceAssembly {
    fn new(service_type: TypeName) -> Self {
        Self {
            types: vec![service_type],
            identity: None,
            importer: TypeName::new(names::INSTANCE_IMPORTER),
            instance: None,
            visibility: Visibility::Module,
            instantiate_on_startup: false,
            meta_info: MetaInfo::new(),
        }
    }

    /// Set the service identity
    pub fn identified_by(&mut self, identity: impl Into<String>) -> &mut Self {
        self.identity = Some(identity.into());
        self
    }

    /// Use a custom importer object class
    pub fn imported_by(&mut self, importer: impl Into<TypeName>) -> &mut Self {
        self.importer = importer.into();
        self
    }

    /// Register the instance handed out by the default importer
    ///
    /// Retrieve it with `ServiceReference::native::<T>()`.
    pub fn with_instance<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.instance = Some(Arc::new(instance));
        self
    }

    /// Also expose the service as `service_type`
    pub fn with_type(&mut self, service_type: impl Into<TypeName>) -> &mut Self {
        let service_type = service_type.into();
        if !self.types.contains(&service_type) {
            self.types.push(service_type);
        }
        self
    }

    /// Set the visibility
    pub fn visible_in(&mut self, visibility: Visibility) -> &mut Self {
        self.visibility = visibility;
        self
    }

    /// Import when the application is activated instead of on first use
    pub fn instantiate_on_startup(&mut self) -> &mut Self {
        self.instantiate_on_startup = true;
        self
    }

    /// Attach meta info, readable by importers
    pub fn set_meta_info<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.meta_info.set(value);
        self
    }
}

/// Declaration of an object class
#[derive(Debug)]
pub struct ObjectAssembly {
    pub(crate) class: TypeName,
    pub(crate) visibility: Visibility,
}

impl ObjectAssembly {
    /// Set the visibility
    pub fn visible_in(&mut self, visibility: Visibility) -> &mut Self {
        self.visibility = visibility;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembly() -> ApplicationAssembly {
        let universe = TypeUniverse::builder().build().unwrap();
        ApplicationAssembly::new("Test", Arc::new(universe))
    }

    #[test]
    fn test_layers_and_modules_are_created_once() {
        let mut app = assembly();
        app.layer("domain").module("people");
        app.layer("domain").module("people");
        app.layer("domain").uses("infrastructure").uses("infrastructure");

        assert_eq!(app.layers().len(), 1);
        assert_eq!(app.layers()[0].modules().len(), 1);
        assert_eq!(app.layers()[0].uses, vec!["infrastructure".to_string()]);
    }

    #[test]
    fn test_composite_declaration_builders() {
        let mut app = assembly();
        let module = app.layer("domain").module("people");
        module
            .entity("Person")
            .with_types(["Named", "Person"])
            .with_mixins(["PersonMixin"])
            .with_concerns(["Audit"])
            .visible_in(Visibility::Application);
        module.service("Registry").identified_by("registry").instantiate_on_startup();

        let entity = &module.entities[0];
        assert_eq!(entity.declaration().types, vec![TypeName::new("Person"), TypeName::new("Named")]);
        assert_eq!(entity.visibility, Visibility::Application);
        assert_eq!(module.services[0].identity.as_deref(), Some("registry"));
        assert!(module.services[0].instantiate_on_startup);
    }

    #[test]
    fn test_imported_port_defaults_to_instance_importer() {
        let mut app = assembly();
        let module = app.layer("infrastructure").module("store");
        module.entity_store(Arc::new(crate::spi::MemoryEntityStore::new()));

        let imported = &module.imported_services[0];
        assert_eq!(imported.importer, names::INSTANCE_IMPORTER);
        assert_eq!(imported.types, vec![TypeName::new(names::ENTITY_STORE)]);
        assert!(imported.instance.is_some());
    }
}
