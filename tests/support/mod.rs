#![allow(dead_code)]

//! Shared fixtures: a small banking domain assembled into one application

use cim_composite::fragment::{ConstraintClass, FragmentClass};
use cim_composite::spi::{EntityFinder, EntityStore, MemoryEntityStore, MetricsProvider};
use cim_composite::structure::{ApplicationAssembly, ModuleAssembly};
use cim_composite::types::{names, Annotation, MethodDeclaration, TypeDescriptor, ValueType};
use cim_composite::{
    Application, ApplicationModelFactory, EntityState, Module, TypeName, TypeUniverse,
    TypeUniverseBuilder,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const DOMAIN_LAYER: &str = "domain";
pub const ACCOUNTS_MODULE: &str = "accounts";

/// Types, fragments and constraints of the banking domain
pub fn universe_builder() -> TypeUniverseBuilder {
    TypeUniverse::builder()
        .register(TypeDescriptor::constraint_annotation("NotEmpty").implemented_by(["NotEmptyConstraint"]))
        .register(TypeDescriptor::constraint_annotation("Positive").implemented_by(["PositiveConstraint"]))
        .constraint(ConstraintClass::new(
            "NotEmptyConstraint",
            "NotEmpty",
            ValueType::String,
            |_: &Annotation, value: &Value| value.as_str().is_some_and(|s| !s.is_empty()),
        ))
        .constraint(ConstraintClass::new(
            "PositiveConstraint",
            "Positive",
            ValueType::Integer,
            |_: &Annotation, value: &Value| value.as_i64().is_some_and(|n| n > 0),
        ))
        .register(
            TypeDescriptor::interface("AccountState")
                .method(
                    MethodDeclaration::property("owner", ValueType::String)
                        .annotated(Annotation::new("NotEmpty")),
                )
                .method(
                    MethodDeclaration::property("balance", ValueType::Integer)
                        .annotated(Annotation::new(names::USE_DEFAULTS)),
                ),
        )
        .register(
            TypeDescriptor::interface("AccountBehavior").method(
                MethodDeclaration::new("deposit")
                    .param_annotated("amount", ValueType::Integer, vec![Annotation::new("Positive")])
                    .returns(ValueType::Integer),
            ),
        )
        .register(
            TypeDescriptor::interface("Account")
                .extends("AccountState")
                .extends("AccountBehavior")
                .mixins(["AccountMixin"]),
        )
        .fragment(
            FragmentClass::stateless_mixin("AccountMixin", |invocation| {
                let this = invocation.this();
                let balance = this.property("balance")?.as_i64().unwrap_or(0);
                let amount = invocation.arg(0).as_i64().unwrap_or(0);
                this.set_property("balance", balance + amount)?;
                Ok(json!(balance + amount))
            })
            .implements("AccountBehavior"),
        )
        .register(
            TypeDescriptor::interface("Money")
                .method(MethodDeclaration::property("amount", ValueType::Integer))
                .method(MethodDeclaration::property("currency", ValueType::String)),
        )
        .register(
            TypeDescriptor::interface("Greeter")
                .method(
                    MethodDeclaration::new("greet")
                        .param("name", ValueType::String)
                        .returns(ValueType::String),
                )
                .mixins(["PoliteGreeter", "RudeGreeter"]),
        )
        .fragment(
            FragmentClass::stateless_mixin("PoliteGreeter", |invocation| {
                Ok(json!(format!("Good day, {}", invocation.arg(0).as_str().unwrap_or(""))))
            })
            .implements("Greeter"),
        )
        .fragment(
            FragmentClass::stateless_mixin("RudeGreeter", |invocation| {
                Ok(json!(format!("What, {}?", invocation.arg(0).as_str().unwrap_or(""))))
            })
            .implements("Greeter"),
        )
        .register(
            TypeDescriptor::interface("Clock")
                .method(MethodDeclaration::new("now").returns(ValueType::Integer))
                .mixins(["FixedClock"]),
        )
        .fragment(FragmentClass::stateless_mixin("FixedClock", |_| Ok(json!(1_700_000_000))).implements("Clock"))
}

pub fn universe() -> Arc<TypeUniverse> {
    Arc::new(universe_builder().build().expect("fixture universe is valid"))
}

/// Declare the banking composites in a module
pub fn declare_domain(module: &mut ModuleAssembly) {
    module.entity("Account");
    module.value("Money");
    module.transient("Greeter");
}

/// Store shared by the entity store and entity finder ports
pub fn attach_store(module: &mut ModuleAssembly, store: &MemoryEntityStore) {
    module.entity_store(Arc::new(store.clone()) as Arc<dyn EntityStore>);
    module.entity_finder(Arc::new(store.clone()) as Arc<dyn EntityFinder>);
}

/// One-layer application with the domain module backed by `store`
pub fn application(store: &MemoryEntityStore) -> Application {
    application_with(store, |_| {})
}

/// Like [`application`], letting the caller add to the module
pub fn application_with(store: &MemoryEntityStore, extra: impl FnOnce(&mut ModuleAssembly)) -> Application {
    let mut assembly = ApplicationAssembly::new("Bank", universe());
    let module = assembly.layer(DOMAIN_LAYER).module(ACCOUNTS_MODULE);
    declare_domain(module);
    attach_store(module, store);
    extra(module);
    let model = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .expect("fixture application assembles");
    model.new_instance()
}

/// Application whose module also imports a metrics provider
pub fn application_with_metrics(store: &MemoryEntityStore, metrics: Arc<dyn MetricsProvider>) -> Application {
    application_with(store, move |module| {
        module.metrics_provider(metrics);
    })
}

pub fn accounts(application: &Application) -> Module {
    application
        .module(DOMAIN_LAYER, ACCOUNTS_MODULE)
        .expect("accounts module exists")
}

/// Stored account state at `version`
pub fn stored_account(identity: &str, owner: &str, balance: i64, version: u64) -> EntityState {
    let mut state = EntityState::new(
        identity.into(),
        TypeName::new("Account"),
        [
            ("owner".to_string(), json!(owner)),
            ("balance".to_string(), json!(balance)),
        ]
        .into_iter()
        .collect(),
    );
    state.version = version;
    state
}
