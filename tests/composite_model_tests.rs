//! Composite model construction through a full application assembly

mod support;

use cim_composite::fragment::FragmentClass;
use cim_composite::model::{CompositeKind, DefaultValuePolicy, StateDeclaration};
use cim_composite::structure::{ApplicationAssembly, CompositeAssembler};
use cim_composite::types::{MethodDeclaration, TypeDescriptor, ValueType};
use cim_composite::{ApplicationModelFactory, AssemblyError, ErrorKind};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use support::{ACCOUNTS_MODULE, DOMAIN_LAYER};

fn build(assembly: ApplicationAssembly) -> Result<Arc<cim_composite::ApplicationModel>, AssemblyError> {
    ApplicationModelFactory::new().new_application_model(assembly)
}

#[test]
fn test_entity_with_constrained_and_defaulted_property() {
    let mut assembly = ApplicationAssembly::new("Bank", support::universe());
    assembly
        .layer(DOMAIN_LAYER)
        .module(ACCOUNTS_MODULE)
        .entity("Account");
    let application = build(assembly).unwrap();

    let module = application.find_module(DOMAIN_LAYER, ACCOUNTS_MODULE).unwrap();
    let account = module.entities()[0].model();
    assert_eq!(account.kind(), CompositeKind::Entity);
    assert_eq!(account.state().len(), 2);

    let owner = account.state().get("owner").unwrap();
    let owner_constraints: Vec<_> = owner
        .constraints()
        .constraints()
        .iter()
        .map(|c| c.annotation().annotation_type.to_string())
        .collect();
    assert_eq!(owner_constraints, vec!["NotEmpty"]);
    assert!(!owner.is_optional());
    assert_eq!(owner.initial_value(), json!(null));

    let balance = account.state().get("balance").unwrap();
    assert!(balance.constraints().constraints().is_empty());
    assert_eq!(balance.default_value(), &DefaultValuePolicy::UseDefaults);
    assert_eq!(balance.initial_value(), json!(0));
}

#[test]
fn test_duplicated_mixin_declaration_resolves_to_first_candidate() {
    let mut assembly = ApplicationAssembly::new("Greetings", support::universe());
    assembly
        .layer(DOMAIN_LAYER)
        .module("greetings")
        .transient("Greeter")
        .with_mixins(["PoliteGreeter"]);
    let application = build(assembly).unwrap();

    let greeter = application
        .find_module(DOMAIN_LAYER, "greetings")
        .unwrap()
        .transients()[0]
        .model();
    let greet = greeter.find_method("greet").unwrap();
    assert_eq!(greeter.mixins()[greet.mixin_index()].name(), "PoliteGreeter");
    assert_eq!(greeter.mixins().len(), 1);
}

#[test]
fn test_explicit_mixin_precedes_type_declarations() {
    let mut assembly = ApplicationAssembly::new("Greetings", support::universe());
    assembly
        .layer(DOMAIN_LAYER)
        .module("greetings")
        .transient("Greeter")
        .with_mixins(["RudeGreeter"]);
    let application = build(assembly).unwrap();

    let greeter = application
        .find_module(DOMAIN_LAYER, "greetings")
        .unwrap()
        .transients()[0]
        .model();
    let greet = greeter.find_method("greet").unwrap();
    assert_eq!(greeter.mixins()[greet.mixin_index()].name(), "RudeGreeter");
}

#[test]
fn test_repeated_concern_moves_to_last_declaration() {
    let universe = support::universe_builder()
        .fragment(FragmentClass::stateless_concern("Audit", |inv, next| next.proceed(inv)))
        .fragment(FragmentClass::stateless_concern("Timing", |inv, next| next.proceed(inv)))
        .build()
        .unwrap();
    let mut assembly = ApplicationAssembly::new("Greetings", Arc::new(universe));
    assembly
        .layer(DOMAIN_LAYER)
        .module("greetings")
        .transient("Greeter")
        .with_concerns(["Audit", "Timing", "Audit"]);
    let application = build(assembly).unwrap();

    let greeter = application
        .find_module(DOMAIN_LAYER, "greetings")
        .unwrap()
        .transients()[0]
        .model();
    let names: Vec<String> = greeter
        .find_method("greet")
        .unwrap()
        .concern_names()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(names, vec!["Timing", "Audit"]);
}

#[test]
fn test_value_state_is_immutable() {
    let mut assembly = ApplicationAssembly::new("Bank", support::universe());
    assembly.layer(DOMAIN_LAYER).module(ACCOUNTS_MODULE).value("Money");
    let application = build(assembly).unwrap();

    let money = application
        .find_module(DOMAIN_LAYER, ACCOUNTS_MODULE)
        .unwrap()
        .values()[0]
        .model();
    assert!(money.is_immutable());
    assert!(money.state().iter().all(|slot| slot.is_immutable()));
}

#[test]
fn test_module_state_declaration_sets_initial_value() {
    let mut assembly = ApplicationAssembly::new("Bank", support::universe());
    let module = assembly.layer(DOMAIN_LAYER).module(ACCOUNTS_MODULE);
    module.value("Money");
    module.declare_state(
        "Money:currency",
        StateDeclaration {
            initial_value: Some(json!("EUR")),
            ..Default::default()
        },
    );
    let application = build(assembly).unwrap();

    let money = application
        .find_module(DOMAIN_LAYER, ACCOUNTS_MODULE)
        .unwrap()
        .values()[0]
        .model();
    assert_eq!(money.state().get("currency").unwrap().initial_value(), json!("EUR"));
    assert_eq!(money.state().get("amount").unwrap().initial_value(), json!(null));
}

#[test]
fn test_method_without_mixin_fails_with_method_and_types() {
    let universe = support::universe_builder()
        .register(TypeDescriptor::interface("Printer").method(MethodDeclaration::new("print").returns(ValueType::String)))
        .build()
        .unwrap();
    let mut assembly = ApplicationAssembly::new("Printing", Arc::new(universe));
    assembly.layer(DOMAIN_LAYER).module("printing").transient("Printer");

    let err = build(assembly).unwrap_err();
    assert!(matches!(err, AssemblyError::UnresolvedFragment { .. }));
    assert_eq!(err.kind(), ErrorKind::BuildTime);
    let message = err.to_string();
    assert!(message.contains("Printer.print()"), "{message}");
    assert!(message.contains("cim.api.TransientComposite"), "{message}");
}

#[test]
fn test_unknown_type_in_type_set() {
    let mut assembly = ApplicationAssembly::new("Bank", support::universe());
    assembly.layer(DOMAIN_LAYER).module(ACCOUNTS_MODULE).entity("Ledger");

    let err = build(assembly).unwrap_err();
    assert_eq!(err.to_string(), "Unknown type Ledger");
}
