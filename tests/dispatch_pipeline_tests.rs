//! Method dispatch: constraints, concerns, mixin and side-effects

mod support;

use anyhow::anyhow;
use cim_composite::fragment::FragmentClass;
use cim_composite::structure::{ApplicationAssembly, CompositeAssembler};
use cim_composite::types::{names, Annotation, MethodDeclaration, TypeDescriptor, ValueType};
use cim_composite::{
    Application, ApplicationModelFactory, CompositeInstance, InvocationError, RuntimeError,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use support::{ACCOUNTS_MODULE, DOMAIN_LAYER};
use test_case::test_case;

type Log = Arc<Mutex<Vec<String>>>;

struct Calculator {
    _application: Application,
    instance: CompositeInstance,
    log: Log,
}

impl Calculator {
    fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

fn calculator(concerns: &[&str], side_effects: &[&str]) -> Calculator {
    let log: Log = Arc::default();
    let (mixin_log, concern_log, audit_log) = (log.clone(), log.clone(), log.clone());
    let universe = support::universe_builder()
        .register(
            TypeDescriptor::interface("Calculator")
                .method(
                    MethodDeclaration::new("double")
                        .param_annotated("n", ValueType::Integer, vec![Annotation::new("Positive")])
                        .returns(ValueType::Integer),
                )
                .mixins(["Doubler"]),
        )
        .fragment(
            FragmentClass::stateless_mixin("Doubler", move |invocation| {
                mixin_log.lock().push("mixin".to_string());
                Ok(json!(invocation.arg(0).as_i64().unwrap_or_default() * 2))
            })
            .implements("Calculator"),
        )
        .fragment(FragmentClass::stateless_concern("Tracing", move |invocation, next| {
            concern_log.lock().push("concern".to_string());
            next.proceed(invocation)
        }))
        .fragment(FragmentClass::stateless_concern("Cache", |invocation, next| {
            if invocation.arg(0) == &json!(21) {
                return Ok(json!(42));
            }
            next.proceed(invocation)
        }))
        .fragment(FragmentClass::stateless_concern("Clamp", |invocation, next| {
            let n = invocation.arg(0).as_i64().unwrap_or_default().min(10);
            next.proceed(&invocation.with_args(vec![json!(n)]))
        }))
        .fragment(FragmentClass::stateless_side_effect("Audit", move |_, result| {
            audit_log.lock().push(format!("side-effect:{result}"));
            Ok(())
        }))
        .fragment(FragmentClass::stateless_side_effect("Failing", |_, _| {
            Err(InvocationError::msg("audit trail unavailable"))
        }))
        .fragment(FragmentClass::stateless_side_effect("Fatal", |_, _| {
            Err(InvocationError::fatal(anyhow!("ledger corrupted")))
        }))
        .build()
        .unwrap();

    let mut assembly = ApplicationAssembly::new("Calculations", Arc::new(universe));
    assembly
        .layer(DOMAIN_LAYER)
        .module("math")
        .transient("Calculator")
        .with_concerns(concerns.iter().copied())
        .with_side_effects(side_effects.iter().copied());
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();
    let instance = application
        .module(DOMAIN_LAYER, "math")
        .unwrap()
        .new_transient("Calculator")
        .unwrap();
    Calculator {
        _application: application,
        instance,
        log,
    }
}

#[test]
fn test_phases_run_in_order() {
    let calculator = calculator(&["Tracing"], &["Audit"]);

    let result = calculator.instance.invoke("double", vec![json!(4)]).unwrap();
    assert_eq!(result, json!(8));
    assert_eq!(calculator.entries(), vec!["concern", "mixin", "side-effect:8"]);
}

#[test]
fn test_constraint_failure_stops_before_concerns() {
    let calculator = calculator(&["Tracing"], &["Audit"]);

    let err = calculator.instance.invoke("double", vec![json!(-3)]).unwrap_err();
    let InvocationError::ConstraintViolation(violation) = err else {
        panic!("expected a constraint violation");
    };
    assert_eq!(violation.member, "double");
    assert_eq!(violation.violations.len(), 1);
    assert_eq!(violation.violations[0].name, "n");
    assert_eq!(violation.violations[0].constraint, "Positive");
    assert_eq!(violation.violations[0].value, json!(-3));
    assert!(calculator.entries().is_empty());
}

#[test]
fn test_missing_argument_is_not_optional() {
    let calculator = calculator(&[], &[]);

    let err = calculator.instance.invoke("double", vec![]).unwrap_err();
    let InvocationError::ConstraintViolation(violation) = err else {
        panic!("expected a constraint violation");
    };
    assert_eq!(violation.violations[0].constraint, names::NOT_OPTIONAL);
}

#[test]
fn test_concern_short_circuits_mixin() {
    let calculator = calculator(&["Tracing", "Cache"], &["Audit"]);

    assert_eq!(calculator.instance.invoke("double", vec![json!(21)]).unwrap(), json!(42));
    assert_eq!(calculator.entries(), vec!["concern", "side-effect:42"]);
}

#[test]
fn test_concern_rewrites_arguments() {
    let calculator = calculator(&["Clamp"], &[]);

    assert_eq!(calculator.instance.invoke("double", vec![json!(50)]).unwrap(), json!(20));
    assert_eq!(calculator.instance.invoke("double", vec![json!(3)]).unwrap(), json!(6));
}

#[test_case(&["Failing", "Audit"], Ok(json!(10)), &["mixin", "side-effect:10"]; "ordinary failure is swallowed")]
#[test_case(&["Fatal", "Audit"], Err(()), &["mixin"]; "fatal failure propagates")]
#[test_case(&["Audit", "Fatal"], Err(()), &["mixin", "side-effect:10"]; "earlier side-effects still ran")]
fn test_side_effect_failures(side_effects: &[&str], expected: Result<serde_json::Value, ()>, log: &[&str]) {
    let calculator = calculator(&[], side_effects);

    let result = calculator.instance.invoke("double", vec![json!(5)]);
    match expected {
        Ok(value) => assert_eq!(result.unwrap(), value),
        Err(()) => assert!(result.unwrap_err().is_fatal()),
    }
    assert_eq!(calculator.entries(), log);
}

#[test]
fn test_unknown_method() {
    let calculator = calculator(&[], &[]);

    let err = calculator.instance.invoke("triple", vec![json!(1)]).unwrap_err();
    assert!(matches!(err, InvocationError::NoSuchMethod { .. }));
    assert_eq!(err.to_string(), "No method triple on composite Calculator");
}

fn bank() -> Application {
    let mut assembly = ApplicationAssembly::new("Bank", support::universe());
    let module = assembly.layer(DOMAIN_LAYER).module(ACCOUNTS_MODULE);
    module.value("Money");
    module.transient("Money").with_types(["Greeter"]);
    ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance()
}

#[test]
fn test_value_builder_validates_and_freezes() {
    let application = bank();
    let accounts = support::accounts(&application);

    let mut builder = accounts.new_value_builder("Money").unwrap();
    builder.set("amount", 12).unwrap();
    let err = builder.new_instance().unwrap_err();
    assert!(err.is_constraint_violation());

    builder.set("currency", "EUR").unwrap();
    let money = builder.new_instance().unwrap();
    assert_eq!(money.invoke("amount", vec![]).unwrap(), json!(12));
    assert_eq!(money.property("currency").unwrap(), json!("EUR"));

    let err = money.set_property("amount", 13).unwrap_err();
    assert!(matches!(err, InvocationError::ImmutableState { .. }));
    assert_eq!(money.property("amount").unwrap(), json!(12));
}

#[test]
fn test_builder_rejects_unknown_state() {
    let application = bank();
    let accounts = support::accounts(&application);

    let mut builder = accounts.new_value_builder("Money").unwrap();
    let err = builder.set("colour", "blue").unwrap_err();
    assert!(matches!(err, InvocationError::NoSuchState { .. }));
}

#[test]
fn test_transient_state_is_mutable() {
    let application = bank();
    let accounts = support::accounts(&application);

    let mut builder = accounts.new_transient_builder("Money").unwrap();
    builder.set("amount", 1).unwrap().set("currency", "USD").unwrap();
    let wallet = builder.new_instance().unwrap();
    wallet.set_property("amount", 7).unwrap();
    assert_eq!(wallet.property("amount").unwrap(), json!(7));
    assert_eq!(wallet.invoke("greet", vec![json!("Ada")]).unwrap(), json!("Good day, Ada"));

    let second = builder.new_instance().unwrap();
    assert_eq!(second.property("amount").unwrap(), json!(1));
    assert!(!second.is_same(&wallet));
}

#[test]
fn test_value_survives_serialization() {
    let application = bank();
    let accounts = support::accounts(&application);

    let mut builder = accounts.new_value_builder("Money").unwrap();
    builder.set("amount", 250).unwrap().set("currency", "GBP").unwrap();
    let money = builder.new_instance().unwrap();

    let text = accounts.value_to_string(&money).unwrap();
    let copy = accounts.new_value_from_serialized_state("Money", &text).unwrap();
    assert_eq!(copy.state(), money.state());
    assert!(!copy.is_same(&money));
}

#[test]
fn test_malformed_serialized_value() {
    let application = bank();
    let accounts = support::accounts(&application);

    let err = accounts
        .new_value_from_serialized_state("Money", "{not json")
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Serialization(_)));
}
