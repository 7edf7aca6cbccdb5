// Copyright 2025 Cowboy AI, LLC.

//! Immutable application model tree
//!
//! Built once by the [`ApplicationModelFactory`](super::ApplicationModelFactory),
//! bound, then shared read-only by every application instance created from it.

use super::instance::Application;
use super::visitor::{walk, ApplicationDescription, DescribeVisitor};
use crate::config::{ApplicationConfig, ApplicationMode};
use crate::fragment::ObjectClass;
use crate::meta_info::MetaInfo;
use crate::model::{CompositeModel, DependencyModel};
use crate::types::{TypeName, TypeUniverse, Visibility};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Position of a module in the application: layer index and module index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId {
    /// Layer index
    pub layer: usize,
    /// Module index within the layer
    pub module: usize,
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.module)
    }
}

/// A composite model placed in a module
#[derive(Debug)]
pub struct CompositeDescriptor {
    pub(crate) module: ModuleId,
    pub(crate) visibility: Visibility,
    pub(crate) model: CompositeModel,
}

impl CompositeDescriptor {
    /// Owning module
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Declared visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// The compiled composite
    pub fn model(&self) -> &CompositeModel {
        &self.model
    }

    /// Primary type
    pub fn primary_type(&self) -> &TypeName {
        self.model.primary_type()
    }
}

/// A service composite with its identity
#[derive(Debug)]
pub struct ServiceModel {
    pub(crate) descriptor: Arc<CompositeDescriptor>,
    pub(crate) identity: String,
    pub(crate) instantiate_on_startup: bool,
}

impl ServiceModel {
    /// Service identity, unique within the module
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The service composite
    pub fn descriptor(&self) -> &Arc<CompositeDescriptor> {
        &self.descriptor
    }

    /// Whether the service is created on activation
    pub fn instantiate_on_startup(&self) -> bool {
        self.instantiate_on_startup
    }
}

/// A service whose instance is produced by an importer
#[derive(Debug)]
pub struct ImportedServiceModel {
    pub(crate) module: ModuleId,
    pub(crate) visibility: Visibility,
    pub(crate) identity: String,
    pub(crate) types: Vec<TypeName>,
    pub(crate) importer: TypeName,
    pub(crate) instance: Option<Arc<dyn Any + Send + Sync>>,
    pub(crate) meta_info: MetaInfo,
    pub(crate) instantiate_on_startup: bool,
}

impl ImportedServiceModel {
    /// Service identity, unique within the module
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Owning module
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Service types
    pub fn types(&self) -> &[TypeName] {
        &self.types
    }

    /// Importer object class
    pub fn importer(&self) -> &TypeName {
        &self.importer
    }

    /// Instance registered on the declaration, if any
    pub fn instance(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.instance.as_ref()
    }

    /// Meta info of the declaration
    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }

    /// Whether the service is imported on activation
    pub fn instantiate_on_startup(&self) -> bool {
        self.instantiate_on_startup
    }
}

/// An object class placed in a module
#[derive(Debug)]
pub struct ObjectModel {
    pub(crate) module: ModuleId,
    pub(crate) visibility: Visibility,
    pub(crate) class: Arc<ObjectClass>,
    pub(crate) types: Vec<TypeName>,
    pub(crate) dependencies: Vec<DependencyModel>,
}

impl ObjectModel {
    pub(crate) fn new(module: ModuleId, visibility: Visibility, class: Arc<ObjectClass>) -> Self {
        let dependencies = class
            .dependencies()
            .iter()
            .cloned()
            .map(DependencyModel::new)
            .collect();
        Self {
            module,
            visibility,
            types: vec![class.name().clone()],
            class,
            dependencies,
        }
    }

    /// Object class
    pub fn class(&self) -> &Arc<ObjectClass> {
        &self.class
    }

    /// Class name
    pub fn name(&self) -> &TypeName {
        self.class.name()
    }

    /// Dependency models
    pub fn dependencies(&self) -> &[DependencyModel] {
        &self.dependencies
    }
}

/// Models declared by one module
#[derive(Debug)]
pub struct ModuleModel {
    pub(crate) id: ModuleId,
    pub(crate) name: String,
    pub(crate) meta_info: MetaInfo,
    pub(crate) transients: Vec<Arc<CompositeDescriptor>>,
    pub(crate) values: Vec<Arc<CompositeDescriptor>>,
    pub(crate) entities: Vec<Arc<CompositeDescriptor>>,
    pub(crate) services: Vec<Arc<ServiceModel>>,
    pub(crate) imported_services: Vec<Arc<ImportedServiceModel>>,
    pub(crate) objects: Vec<Arc<ObjectModel>>,
}

impl ModuleModel {
    /// Position in the application
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Meta info
    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }

    /// Transient composites
    pub fn transients(&self) -> &[Arc<CompositeDescriptor>] {
        &self.transients
    }

    /// Value composites
    pub fn values(&self) -> &[Arc<CompositeDescriptor>] {
        &self.values
    }

    /// Entity composites
    pub fn entities(&self) -> &[Arc<CompositeDescriptor>] {
        &self.entities
    }

    /// Services
    pub fn services(&self) -> &[Arc<ServiceModel>] {
        &self.services
    }

    /// Imported services
    pub fn imported_services(&self) -> &[Arc<ImportedServiceModel>] {
        &self.imported_services
    }

    /// Objects, including implicitly registered importers
    pub fn objects(&self) -> &[Arc<ObjectModel>] {
        &self.objects
    }

    /// Object model of a class declared in this module
    pub fn object(&self, class: &str) -> Option<&Arc<ObjectModel>> {
        self.objects.iter().find(|o| o.name() == class)
    }
}

/// A layer: its modules and the layers it uses
#[derive(Debug)]
pub struct LayerModel {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) used_layers: Vec<usize>,
    pub(crate) modules: Vec<ModuleModel>,
    pub(crate) meta_info: MetaInfo,
}

impl LayerModel {
    /// Position in the application
    pub fn index(&self) -> usize {
        self.index
    }

    /// Layer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indices of the used layers
    pub fn used_layers(&self) -> &[usize] {
        &self.used_layers
    }

    /// Modules in declaration order
    pub fn modules(&self) -> &[ModuleModel] {
        &self.modules
    }

    /// Module by name
    pub fn module(&self, name: &str) -> Option<&ModuleModel> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Meta info
    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }
}

/// The bound, immutable model of an application
#[derive(Debug)]
pub struct ApplicationModel {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) mode: ApplicationMode,
    pub(crate) layers: Vec<LayerModel>,
    pub(crate) universe: Arc<TypeUniverse>,
    pub(crate) config: ApplicationConfig,
    pub(crate) meta_info: MetaInfo,
}

impl ApplicationModel {
    /// Application name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Application version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Run mode
    pub fn mode(&self) -> ApplicationMode {
        self.mode
    }

    /// Configuration the application was assembled from
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Meta info
    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }

    /// The type universe
    pub fn universe(&self) -> &Arc<TypeUniverse> {
        &self.universe
    }

    /// Layers in declaration order
    pub fn layers(&self) -> &[LayerModel] {
        &self.layers
    }

    /// Layer by name
    pub fn layer(&self, name: &str) -> Option<&LayerModel> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Module by position
    pub fn module(&self, id: ModuleId) -> Option<&ModuleModel> {
        self.layers.get(id.layer)?.modules.get(id.module)
    }

    /// Module by layer and module name
    pub fn find_module(&self, layer: &str, module: &str) -> Option<&ModuleModel> {
        self.layer(layer)?.module(module)
    }

    /// Serializable outline of the whole model
    pub fn describe(&self) -> ApplicationDescription {
        let mut visitor = DescribeVisitor::default();
        match walk(self, &mut visitor) {
            Ok(()) => visitor.finish(),
            Err(never) => match never {},
        }
    }

    /// Create a running application from this model
    pub fn new_instance(self: &Arc<Self>) -> Application {
        Application::new(self.clone())
    }
}
