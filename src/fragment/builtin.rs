// Copyright 2025 Cowboy AI, LLC.

//! Types and fragments every universe starts with

use super::{AppliesTo, AppliesToContext, FragmentClass, ObjectClass};
use crate::structure::ImportedServiceModel;
use crate::types::{names, ReturnKind, TypeDescriptor, TypeUniverseBuilder};
use anyhow::anyhow;
use std::any::Any;
use std::sync::Arc;

/// Produces the instance behind an imported service
pub trait ServiceImporter: Send + Sync {
    /// Create or fetch the service instance
    fn import(&self, service: &ImportedServiceModel) -> anyhow::Result<Arc<dyn Any + Send + Sync>>;

    /// Whether an imported instance is still usable
    fn is_available(&self, _instance: &(dyn Any + Send + Sync)) -> bool {
        true
    }
}

/// Hands out the instance registered on the imported service declaration
#[derive(Debug, Default, Clone, Copy)]
pub struct InstanceImporter;

impl ServiceImporter for InstanceImporter {
    fn import(&self, service: &ImportedServiceModel) -> anyhow::Result<Arc<dyn Any + Send + Sync>> {
        service
            .instance()
            .cloned()
            .ok_or_else(|| anyhow!("No instance registered for imported service {}", service.identity()))
    }
}

fn accessor_of(kind: fn(&ReturnKind) -> bool) -> AppliesTo {
    AppliesTo::filter(move |ctx: &AppliesToContext<'_>| {
        ctx.method.parameters.is_empty() && kind(&ctx.method.returns)
    })
}

pub(crate) fn register_builtins(builder: TypeUniverseBuilder) -> TypeUniverseBuilder {
    let composite = TypeDescriptor::interface(names::COMPOSITE).mixins([
        names::PROPERTY_MIXIN,
        names::ASSOCIATION_MIXIN,
        names::MANY_ASSOCIATION_MIXIN,
        names::NAMED_ASSOCIATION_MIXIN,
    ]);

    let property = FragmentClass::stateless_generic_mixin(names::PROPERTY_MIXIN, |invocation| {
        invocation.this().property(&invocation.method().name)
    })
    .applies_to(accessor_of(|r| matches!(r, ReturnKind::Property(_))));

    let association =
        FragmentClass::stateless_generic_mixin(names::ASSOCIATION_MIXIN, |invocation| {
            invocation.this().association(&invocation.method().name)
        })
        .applies_to(accessor_of(|r| matches!(r, ReturnKind::Association(_))));

    let many = FragmentClass::stateless_generic_mixin(names::MANY_ASSOCIATION_MIXIN, |invocation| {
        invocation.this().many_association(&invocation.method().name)
    })
    .applies_to(accessor_of(|r| matches!(r, ReturnKind::ManyAssociation(_))));

    let named =
        FragmentClass::stateless_generic_mixin(names::NAMED_ASSOCIATION_MIXIN, |invocation| {
            invocation.this().named_association(&invocation.method().name)
        })
        .applies_to(accessor_of(|r| matches!(r, ReturnKind::NamedAssociation(_))));

    let importer = ObjectClass::new(names::INSTANCE_IMPORTER, |_| {
        let importer: Arc<dyn ServiceImporter> = Arc::new(InstanceImporter);
        Ok(Arc::new(importer) as Arc<dyn Any + Send + Sync>)
    });

    let mut builder = builder
        .register(composite)
        .fragment(property)
        .fragment(association)
        .fragment(many)
        .fragment(named)
        .object(importer);

    for kind in [
        names::TRANSIENT_COMPOSITE,
        names::VALUE_COMPOSITE,
        names::ENTITY_COMPOSITE,
        names::SERVICE_COMPOSITE,
    ] {
        builder = builder.register(TypeDescriptor::interface(kind).extends(names::COMPOSITE));
    }

    for port in [
        names::ENTITY_STORE,
        names::IDENTITY_GENERATOR,
        names::VALUE_SERIALIZATION,
        names::METRICS_PROVIDER,
        names::ENTITY_FINDER,
        names::STRUCTURE_MODULE,
        names::STRUCTURE_LAYER,
        names::STRUCTURE_APPLICATION,
        names::STRUCTURE_UNIT_OF_WORK_FACTORY,
    ] {
        builder = builder.register(TypeDescriptor::interface(port));
    }

    for annotation in [names::OPTIONAL, names::USE_DEFAULTS, names::IMMUTABLE, names::NOT_OPTIONAL] {
        builder = builder.register(TypeDescriptor::annotation(annotation));
    }

    builder
}
