// Copyright 2025 Cowboy AI, LLC.

//! Assembly to model compilation

use super::assembly::{
    ApplicationAssembly, CompositeAssembly, ImportedServiceAssembly, LayerAssembly, ModuleAssembly,
};
use super::lookup::VisibleScopes;
use super::model::{
    ApplicationModel, CompositeDescriptor, ImportedServiceModel, LayerModel, ModuleId,
    ModuleModel, ObjectModel, ServiceModel,
};
use super::visitor::{walk, BindingVisitor};
use crate::errors::AssemblyError;
use crate::fragment::AssemblyHelper;
use crate::model::CompositeModelBuilder;
use crate::spi::{JsonSerialization, UuidIdentityGenerator};
use crate::types::{names, TypeName, Visibility};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Name of the layer holding default SPI implementations
pub const SUPPORT_LAYER: &str = "cim-support";
/// Name of the module holding default SPI implementations
pub const SUPPORT_MODULE: &str = "spi-defaults";

/// Turns an [`ApplicationAssembly`] into a bound [`ApplicationModel`]
///
/// Layers are built independently, `uses` edges are resolved in a second
/// pass, and the whole tree is bound before it is returned.
#[derive(Debug, Default)]
pub struct ApplicationModelFactory;

impl ApplicationModelFactory {
    /// Create a factory
    pub fn new() -> Self {
        Self
    }

    /// Build and bind the application model
    pub fn new_application_model(
        &self,
        assembly: ApplicationAssembly,
    ) -> Result<Arc<ApplicationModel>, AssemblyError> {
        let ApplicationAssembly {
            universe,
            config,
            layers: layer_assemblies,
            meta_info,
        } = assembly;

        let mut names_seen = HashSet::new();
        for layer in &layer_assemblies {
            if layer.name.is_empty() {
                return Err(AssemblyError::MissingLayerName);
            }
            if !names_seen.insert(layer.name.as_str()) {
                return Err(AssemblyError::DuplicateLayer(layer.name.clone()));
            }
            if layer.modules.iter().any(|m| m.name.is_empty()) {
                return Err(AssemblyError::MissingModuleName {
                    layer: layer.name.clone(),
                });
            }
        }

        let helper = AssemblyHelper::new(universe.clone());
        let mut layers = Vec::with_capacity(layer_assemblies.len());
        for (index, layer) in layer_assemblies.iter().enumerate() {
            layers.push(build_layer(&helper, index, layer)?);
        }

        for (layer, assembly) in layers.iter_mut().zip(&layer_assemblies) {
            for used in &assembly.uses {
                let index = layer_assemblies
                    .iter()
                    .position(|l| &l.name == used)
                    .ok_or_else(|| AssemblyError::InvalidApplication {
                        layer: assembly.name.clone(),
                        used: used.clone(),
                    })?;
                layer.used_layers.push(index);
            }
        }

        let mut application = ApplicationModel {
            name: config.name.clone(),
            version: config.version.clone(),
            mode: config.mode,
            layers,
            universe,
            config,
            meta_info,
        };

        if application.config.spi_defaults {
            add_support_layer(&helper, &mut application)?;
        }

        let mut binder = BindingVisitor::default();
        walk(&application, &mut binder).map_err(|source| AssemblyError::Binding {
            application: application.name.clone(),
            source,
        })?;

        debug!(
            application = %application.name,
            layers = application.layers.len(),
            dependencies = binder.bound(),
            "application model bound"
        );
        Ok(Arc::new(application))
    }
}

fn build_layer(
    helper: &AssemblyHelper,
    index: usize,
    assembly: &LayerAssembly,
) -> Result<LayerModel, AssemblyError> {
    let mut modules = Vec::with_capacity(assembly.modules.len());
    for (module_index, module) in assembly.modules.iter().enumerate() {
        let id = ModuleId {
            layer: index,
            module: module_index,
        };
        modules.push(build_module(helper, id, module)?);
    }
    debug!(layer = %assembly.name, modules = modules.len(), "layer model built");
    Ok(LayerModel {
        index,
        name: assembly.name.clone(),
        used_layers: Vec::new(),
        modules,
        meta_info: assembly.meta_info.clone(),
    })
}

fn build_composites(
    builder: &CompositeModelBuilder<'_>,
    id: ModuleId,
    assemblies: &[CompositeAssembly],
) -> Result<Vec<Arc<CompositeDescriptor>>, AssemblyError> {
    assemblies
        .iter()
        .map(|assembly| {
            Ok(Arc::new(CompositeDescriptor {
                module: id,
                visibility: assembly.visibility,
                model: builder.build(&assembly.declaration)?,
            }))
        })
        .collect()
}

/// Identity for an undeclared service: the simple name, then `_1`, `_2`, ...
fn generate_identity(base: &str, used: &HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut suffix = 1;
    while used.contains(&candidate) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    candidate
}

fn build_module(
    helper: &AssemblyHelper,
    id: ModuleId,
    assembly: &ModuleAssembly,
) -> Result<ModuleModel, AssemblyError> {
    let builder = CompositeModelBuilder::new(helper, &assembly.state);
    let universe = helper.universe();

    let transients = build_composites(&builder, id, &assembly.transients)?;
    let values = build_composites(&builder, id, &assembly.values)?;
    let entities = build_composites(&builder, id, &assembly.entities)?;

    let service_models = assembly
        .services
        .iter()
        .map(|service| builder.build(&service.composite.declaration))
        .collect::<Result<Vec<_>, _>>()?;
    let imported_primaries = assembly
        .imported_services
        .iter()
        .map(imported_primary)
        .collect::<Result<Vec<_>, _>>()?;

    let mut used = HashSet::new();
    let explicit = assembly
        .services
        .iter()
        .map(|s| &s.identity)
        .chain(assembly.imported_services.iter().map(|s| &s.identity))
        .flatten();
    for identity in explicit {
        if !used.insert(identity.clone()) {
            return Err(AssemblyError::DuplicateServiceIdentity {
                identity: identity.clone(),
                module: assembly.name.clone(),
            });
        }
    }
    let mut identity_for = |explicit: &Option<String>, primary: &TypeName| match explicit {
        Some(identity) => identity.clone(),
        None => {
            let identity = generate_identity(primary.simple_name(), &used);
            used.insert(identity.clone());
            identity
        }
    };

    let mut services = Vec::with_capacity(assembly.services.len());
    for (service, model) in assembly.services.iter().zip(service_models) {
        let identity = identity_for(&service.identity, model.primary_type());
        services.push(Arc::new(ServiceModel {
            descriptor: Arc::new(CompositeDescriptor {
                module: id,
                visibility: service.composite.visibility,
                model,
            }),
            identity,
            instantiate_on_startup: service.instantiate_on_startup,
        }));
    }

    let mut imported_services = Vec::with_capacity(assembly.imported_services.len());
    for (imported, primary) in assembly.imported_services.iter().zip(imported_primaries) {
        let identity = identity_for(&imported.identity, primary);
        imported_services.push(Arc::new(build_imported(id, imported, identity)));
    }

    let mut objects = Vec::with_capacity(assembly.objects.len());
    for object in &assembly.objects {
        let class = universe
            .object_class(&object.class)
            .cloned()
            .ok_or_else(|| AssemblyError::UnknownType(object.class.clone()))?;
        objects.push(Arc::new(ObjectModel::new(id, object.visibility, class)));
    }

    for imported in &imported_services {
        if objects.iter().any(|o| o.name() == &imported.importer) {
            continue;
        }
        let class = universe
            .object_class(&imported.importer)
            .cloned()
            .ok_or_else(|| AssemblyError::UnknownType(imported.importer.clone()))?;
        debug!(importer = %imported.importer, module = %assembly.name, "importer registered as object");
        objects.push(Arc::new(ObjectModel::new(id, Visibility::Module, class)));
    }

    debug!(
        module = %assembly.name,
        transients = transients.len(),
        values = values.len(),
        entities = entities.len(),
        services = services.len() + imported_services.len(),
        objects = objects.len(),
        "module model built"
    );

    Ok(ModuleModel {
        id,
        name: assembly.name.clone(),
        meta_info: assembly.meta_info.clone(),
        transients,
        values,
        entities,
        services,
        imported_services,
        objects,
    })
}

fn imported_primary(assembly: &ImportedServiceAssembly) -> Result<&TypeName, AssemblyError> {
    assembly.types.first().ok_or_else(|| AssemblyError::InvalidComposite {
        types: Default::default(),
        reason: "imported service without a type".to_string(),
    })
}

fn build_imported(id: ModuleId, assembly: &ImportedServiceAssembly, identity: String) -> ImportedServiceModel {
    ImportedServiceModel {
        module: id,
        visibility: assembly.visibility,
        identity,
        types: assembly.types.clone(),
        importer: assembly.importer.clone(),
        instance: assembly.instance.clone(),
        meta_info: assembly.meta_info.clone(),
        instantiate_on_startup: assembly.instantiate_on_startup,
    }
}

/// Add default identity generation and value serialization where missing
fn add_support_layer(
    helper: &AssemblyHelper,
    application: &mut ApplicationModel,
) -> Result<(), AssemblyError> {
    let required = [
        TypeName::new(names::IDENTITY_GENERATOR),
        TypeName::new(names::VALUE_SERIALIZATION),
    ];
    let mut affected = Vec::new();
    for layer in &application.layers {
        let lacking = layer.modules.iter().any(|module| {
            let scopes = VisibleScopes::new(application, module.id);
            required.iter().any(|t| scopes.find_service(t).is_none())
        });
        if lacking {
            affected.push(layer.index);
        }
    }
    if affected.is_empty() {
        return Ok(());
    }
    if application.layer(SUPPORT_LAYER).is_some() {
        return Err(AssemblyError::DuplicateLayer(SUPPORT_LAYER.to_string()));
    }

    let index = application.layers.len();
    let mut assembly = LayerAssembly::new(SUPPORT_LAYER);
    let module = assembly.module(SUPPORT_MODULE);
    module
        .identity_generator(Arc::new(UuidIdentityGenerator))
        .visible_in(Visibility::Application);
    module
        .value_serialization(Arc::new(JsonSerialization))
        .visible_in(Visibility::Application);
    application.layers.push(build_layer(helper, index, &assembly)?);

    for layer in affected {
        application.layers[layer].used_layers.push(index);
    }
    debug!(layer = SUPPORT_LAYER, "support layer added");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_identities_are_suffixed() {
        let mut used = HashSet::new();
        used.insert("Clock".to_string());
        used.insert("Clock_1".to_string());
        assert_eq!(generate_identity("Clock", &used), "Clock_2");
        assert_eq!(generate_identity("Mailer", &used), "Mailer");
    }

    #[test]
    fn test_unnamed_layer_is_rejected() {
        let universe = Arc::new(crate::types::TypeUniverse::builder().build().unwrap());
        let mut assembly = ApplicationAssembly::new("Test", universe);
        assembly.layer("");
        let err = ApplicationModelFactory::new()
            .new_application_model(assembly)
            .unwrap_err();
        assert!(matches!(err, AssemblyError::MissingLayerName));
    }

    #[test]
    fn test_unknown_used_layer_is_rejected() {
        let universe = Arc::new(crate::types::TypeUniverse::builder().build().unwrap());
        let mut assembly = ApplicationAssembly::new("Test", universe);
        assembly.layer("app").uses("infra").module("main");
        let err = ApplicationModelFactory::new()
            .new_application_model(assembly)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid application: layer app uses unknown layer infra"
        );
    }
}
