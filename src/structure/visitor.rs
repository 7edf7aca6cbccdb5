// Copyright 2025 Cowboy AI, LLC.

//! Hierarchical traversal of the model tree
//!
//! [`walk`] visits the application pre-order and threads a
//! [`VisitContext`] down the recursion. The same traversal drives the
//! binding pass ([`BindingVisitor`]) and model descriptions
//! ([`DescribeVisitor`]).

use super::model::{
    ApplicationModel, CompositeDescriptor, ImportedServiceModel, LayerModel, ModuleModel,
    ObjectModel, ServiceModel,
};
use crate::config::ApplicationMode;
use crate::errors::BindingError;
use crate::model::{
    CompositeKind, CompositeMethodModel, CompositeModel, DependencyModel, FragmentModel,
};
use crate::types::{StateKind, TypeName, ValueType, Visibility};
use serde::Serialize;
use std::convert::Infallible;

/// A node of the model tree
#[derive(Debug, Clone, Copy)]
pub enum ModelNode<'a> {
    /// The application
    Application(&'a ApplicationModel),
    /// A layer
    Layer(&'a LayerModel),
    /// A module
    Module(&'a ModuleModel),
    /// A transient, value or entity composite
    Composite(&'a CompositeDescriptor),
    /// A service composite
    Service(&'a ServiceModel),
    /// An imported service
    ImportedService(&'a ImportedServiceModel),
    /// An object
    Object(&'a ObjectModel),
    /// A composite method
    Method(&'a CompositeMethodModel),
    /// A mixin, concern or side-effect used by a composite
    Fragment(&'a FragmentModel),
}

/// The model a dependency belongs to
#[derive(Debug, Clone, Copy)]
pub enum ModelRef<'a> {
    /// A composite, including service composites
    Composite(&'a CompositeDescriptor),
    /// An object
    Object(&'a ObjectModel),
}

/// Where the traversal currently is
#[derive(Debug, Clone, Copy)]
pub struct VisitContext<'a> {
    /// The application
    pub application: &'a ApplicationModel,
    /// Current layer
    pub layer: Option<&'a LayerModel>,
    /// Current module
    pub module: Option<&'a ModuleModel>,
    /// Current composite or object
    pub model: Option<ModelRef<'a>>,
    /// Current method
    pub method: Option<&'a CompositeMethodModel>,
}

impl<'a> VisitContext<'a> {
    /// Resolution context for `field`, when inside a module model
    pub fn resolution(&self, field: &'a DependencyModel) -> Option<Resolution<'a>> {
        Some(Resolution {
            application: self.application,
            layer: self.layer?,
            module: self.module?,
            model: self.model?,
            method: self.method,
            field: Some(field),
        })
    }
}

/// Everything a dependency needs to bind itself
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    /// The application
    pub application: &'a ApplicationModel,
    /// Layer of the declaring module
    pub layer: &'a LayerModel,
    /// Declaring module
    pub module: &'a ModuleModel,
    /// Model declaring the dependency
    pub model: ModelRef<'a>,
    /// Enclosing method, for concern and side-effect dependencies
    pub method: Option<&'a CompositeMethodModel>,
    /// The dependency being bound
    pub field: Option<&'a DependencyModel>,
}

impl<'a> Resolution<'a> {
    /// Primary type of the composite, or the object class
    pub fn model_name(&self) -> TypeName {
        match self.model {
            ModelRef::Composite(c) => c.primary_type().clone(),
            ModelRef::Object(o) => o.name().clone(),
        }
    }

    /// The composite, if the model is one
    pub fn composite(&self) -> Option<&'a CompositeModel> {
        match self.model {
            ModelRef::Composite(c) => Some(&c.model),
            ModelRef::Object(_) => None,
        }
    }
}

/// Callbacks of [`walk`]
pub trait ModelVisitor<'a> {
    /// Error aborting the traversal
    type Error;

    /// Called before a node's children; `false` skips them
    fn visit_enter(&mut self, _node: ModelNode<'a>, _context: &VisitContext<'a>) -> Result<bool, Self::Error> {
        Ok(true)
    }

    /// Called after a node's children
    fn visit_leave(&mut self, _node: ModelNode<'a>, _context: &VisitContext<'a>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for every dependency
    fn visit(&mut self, _dependency: &'a DependencyModel, _context: &VisitContext<'a>) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Visit the whole model pre-order
pub fn walk<'a, V: ModelVisitor<'a>>(application: &'a ApplicationModel, visitor: &mut V) -> Result<(), V::Error> {
    let context = VisitContext {
        application,
        layer: None,
        module: None,
        model: None,
        method: None,
    };
    let node = ModelNode::Application(application);
    if visitor.visit_enter(node, &context)? {
        for layer in &application.layers {
            walk_layer(layer, visitor, VisitContext { layer: Some(layer), ..context })?;
        }
    }
    visitor.visit_leave(node, &context)
}

fn walk_layer<'a, V: ModelVisitor<'a>>(
    layer: &'a LayerModel,
    visitor: &mut V,
    context: VisitContext<'a>,
) -> Result<(), V::Error> {
    let node = ModelNode::Layer(layer);
    if visitor.visit_enter(node, &context)? {
        for module in &layer.modules {
            walk_module(module, visitor, VisitContext { module: Some(module), ..context })?;
        }
    }
    visitor.visit_leave(node, &context)
}

fn walk_module<'a, V: ModelVisitor<'a>>(
    module: &'a ModuleModel,
    visitor: &mut V,
    context: VisitContext<'a>,
) -> Result<(), V::Error> {
    let node = ModelNode::Module(module);
    if visitor.visit_enter(node, &context)? {
        for composite in module
            .transients
            .iter()
            .chain(&module.values)
            .chain(&module.entities)
        {
            let node = ModelNode::Composite(composite);
            let context = VisitContext {
                model: Some(ModelRef::Composite(composite)),
                ..context
            };
            if visitor.visit_enter(node, &context)? {
                walk_composite(composite, visitor, context)?;
            }
            visitor.visit_leave(node, &context)?;
        }
        for service in &module.services {
            let node = ModelNode::Service(service);
            let context = VisitContext {
                model: Some(ModelRef::Composite(&service.descriptor)),
                ..context
            };
            if visitor.visit_enter(node, &context)? {
                walk_composite(&service.descriptor, visitor, context)?;
            }
            visitor.visit_leave(node, &context)?;
        }
        for imported in &module.imported_services {
            let node = ModelNode::ImportedService(imported);
            visitor.visit_enter(node, &context)?;
            visitor.visit_leave(node, &context)?;
        }
        for object in &module.objects {
            let node = ModelNode::Object(object);
            let context = VisitContext {
                model: Some(ModelRef::Object(object)),
                ..context
            };
            if visitor.visit_enter(node, &context)? {
                for dependency in &object.dependencies {
                    visitor.visit(dependency, &context)?;
                }
            }
            visitor.visit_leave(node, &context)?;
        }
    }
    visitor.visit_leave(node, &context)
}

fn walk_composite<'a, V: ModelVisitor<'a>>(
    composite: &'a CompositeDescriptor,
    visitor: &mut V,
    context: VisitContext<'a>,
) -> Result<(), V::Error> {
    for mixin in &composite.model.mixins {
        walk_fragment(mixin, visitor, &context)?;
    }
    for method in composite.model.methods.values() {
        let node = ModelNode::Method(method);
        let context = VisitContext {
            method: Some(method),
            ..context
        };
        if visitor.visit_enter(node, &context)? {
            for fragment in method.concerns.iter().chain(&method.side_effects) {
                walk_fragment(fragment, visitor, &context)?;
            }
        }
        visitor.visit_leave(node, &context)?;
    }
    Ok(())
}

fn walk_fragment<'a, V: ModelVisitor<'a>>(
    fragment: &'a FragmentModel,
    visitor: &mut V,
    context: &VisitContext<'a>,
) -> Result<(), V::Error> {
    let node = ModelNode::Fragment(fragment);
    if visitor.visit_enter(node, context)? {
        for dependency in fragment.dependencies() {
            visitor.visit(dependency, context)?;
        }
    }
    visitor.visit_leave(node, context)
}

/// Binds every dependency of the model
#[derive(Debug, Default)]
pub struct BindingVisitor {
    bound: usize,
}

impl BindingVisitor {
    /// Number of dependencies bound so far
    pub fn bound(&self) -> usize {
        self.bound
    }
}

impl<'a> ModelVisitor<'a> for BindingVisitor {
    type Error = BindingError;

    fn visit(&mut self, dependency: &'a DependencyModel, context: &VisitContext<'a>) -> Result<(), BindingError> {
        if let Some(resolution) = context.resolution(dependency) {
            dependency.bind(&resolution)?;
            self.bound += 1;
        }
        Ok(())
    }
}

/// Outline of an application model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationDescription {
    /// Application name
    pub name: String,
    /// Application version
    pub version: String,
    /// Run mode
    pub mode: ApplicationMode,
    /// Layers in declaration order
    pub layers: Vec<LayerDescription>,
}

/// Outline of a layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerDescription {
    /// Layer name
    pub name: String,
    /// Names of the used layers
    pub uses: Vec<String>,
    /// Modules
    pub modules: Vec<ModuleDescription>,
}

/// Outline of a module
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ModuleDescription {
    /// Module name
    pub name: String,
    /// Transient, value and entity composites
    pub composites: Vec<CompositeDescription>,
    /// Services and imported services
    pub services: Vec<ServiceDescription>,
    /// Object classes
    pub objects: Vec<TypeName>,
}

/// Outline of a composite
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeDescription {
    /// Composite kind
    pub kind: CompositeKind,
    /// Type set
    pub types: Vec<TypeName>,
    /// Visibility
    pub visibility: Visibility,
    /// Methods
    pub methods: Vec<MethodDescription>,
    /// State slots
    pub state: Vec<StateDescription>,
}

/// Outline of a composite method
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDescription {
    /// Method signature
    pub signature: String,
    /// Implementing mixin
    pub mixin: TypeName,
    /// Concern chain, outermost first
    pub concerns: Vec<TypeName>,
    /// Side-effects
    pub side_effects: Vec<TypeName>,
}

/// Outline of a state slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateDescription {
    /// State name
    pub name: String,
    /// Property or association kind
    pub kind: StateKind,
    /// Value type
    pub value_type: ValueType,
    /// Accepts null
    pub optional: bool,
    /// Frozen after construction
    pub immutable: bool,
}

/// Outline of a service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDescription {
    /// Identity
    pub identity: String,
    /// Types the service is found under
    pub types: Vec<TypeName>,
    /// Visibility
    pub visibility: Visibility,
    /// Importer class of imported services
    pub importer: Option<TypeName>,
    /// The service composite
    pub composite: Option<CompositeDescription>,
}

fn describe_composite(composite: &CompositeDescriptor) -> CompositeDescription {
    let model = &composite.model;
    CompositeDescription {
        kind: model.kind,
        types: model.types.clone(),
        visibility: composite.visibility,
        methods: Vec::new(),
        state: model
            .state
            .iter()
            .map(|slot| StateDescription {
                name: slot.name().to_string(),
                kind: slot.kind(),
                value_type: slot.value_type().clone(),
                optional: slot.is_optional(),
                immutable: slot.is_immutable() || model.immutable,
            })
            .collect(),
    }
}

/// Builds an [`ApplicationDescription`]
#[derive(Debug, Default)]
pub struct DescribeVisitor {
    application: Option<ApplicationDescription>,
}

impl DescribeVisitor {
    /// The finished description
    pub fn finish(self) -> ApplicationDescription {
        self.application.unwrap_or_else(|| ApplicationDescription {
            name: String::new(),
            version: String::new(),
            mode: ApplicationMode::default(),
            layers: Vec::new(),
        })
    }

    fn module(&mut self) -> Option<&mut ModuleDescription> {
        self.application
            .as_mut()?
            .layers
            .last_mut()?
            .modules
            .last_mut()
    }
}

impl<'a> ModelVisitor<'a> for DescribeVisitor {
    type Error = Infallible;

    fn visit_enter(&mut self, node: ModelNode<'a>, context: &VisitContext<'a>) -> Result<bool, Infallible> {
        match node {
            ModelNode::Application(app) => {
                self.application = Some(ApplicationDescription {
                    name: app.name.clone(),
                    version: app.version.clone(),
                    mode: app.mode,
                    layers: Vec::new(),
                });
            }
            ModelNode::Layer(layer) => {
                if let Some(app) = self.application.as_mut() {
                    app.layers.push(LayerDescription {
                        name: layer.name.clone(),
                        uses: layer
                            .used_layers
                            .iter()
                            .filter_map(|i| context.application.layers.get(*i))
                            .map(|l| l.name.clone())
                            .collect(),
                        modules: Vec::new(),
                    });
                }
            }
            ModelNode::Module(module) => {
                if let Some(layer) = self.application.as_mut().and_then(|a| a.layers.last_mut()) {
                    layer.modules.push(ModuleDescription {
                        name: module.name.clone(),
                        ..Default::default()
                    });
                }
            }
            ModelNode::Composite(composite) => {
                if let Some(module) = self.module() {
                    module.composites.push(describe_composite(composite));
                }
            }
            ModelNode::Service(service) => {
                if let Some(module) = self.module() {
                    module.services.push(ServiceDescription {
                        identity: service.identity.clone(),
                        types: service.descriptor.model.types.clone(),
                        visibility: service.descriptor.visibility,
                        importer: None,
                        composite: Some(describe_composite(&service.descriptor)),
                    });
                }
            }
            ModelNode::ImportedService(imported) => {
                if let Some(module) = self.module() {
                    module.services.push(ServiceDescription {
                        identity: imported.identity.clone(),
                        types: imported.types.clone(),
                        visibility: imported.visibility,
                        importer: Some(imported.importer.clone()),
                        composite: None,
                    });
                }
            }
            ModelNode::Object(object) => {
                if let Some(module) = self.module() {
                    module.objects.push(object.name().clone());
                }
                return Ok(false);
            }
            ModelNode::Method(method) => {
                let in_service = matches!(
                    context.model,
                    Some(ModelRef::Composite(c)) if c.model.kind == CompositeKind::Service
                );
                let mixin = match context.model {
                    Some(ModelRef::Composite(c)) => c.model.mixins[method.mixin].name().clone(),
                    _ => return Ok(false),
                };
                let description = MethodDescription {
                    signature: method.method.signature(),
                    mixin,
                    concerns: method.concern_names().into_iter().cloned().collect(),
                    side_effects: method.side_effect_names().into_iter().cloned().collect(),
                };
                let composite = self.module().and_then(|module| {
                    if in_service {
                        module.services.last_mut()?.composite.as_mut()
                    } else {
                        module.composites.last_mut()
                    }
                });
                if let Some(composite) = composite {
                    composite.methods.push(description);
                }
                return Ok(false);
            }
            ModelNode::Fragment(_) => return Ok(false),
        }
        Ok(true)
    }
}
