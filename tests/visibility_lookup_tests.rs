//! Visibility-scoped lookup across modules and layers

mod support;

use cim_composite::structure::{ApplicationAssembly, CompositeAssembler};
use cim_composite::{ApplicationModelFactory, LookupError, TypeName, Visibility};
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

/// Layer "app" uses layer "infra"; infra declares a clock service
fn clock_application(visibility: Visibility) -> cim_composite::Application {
    let mut assembly = ApplicationAssembly::new("Layers", support::universe());
    assembly.layer("app").uses("infra").module("web");
    assembly
        .layer("infra")
        .module("time")
        .service("Clock")
        .visible_in(visibility);
    ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance()
}

#[test_case(Visibility::Application, true; "application visibility crosses used layers")]
#[test_case(Visibility::Layer, false; "layer visibility stays in the layer")]
#[test_case(Visibility::Module, false; "module visibility stays in the module")]
fn test_service_seen_from_using_layer(visibility: Visibility, visible: bool) {
    let application = clock_application(visibility);
    let web = application.module("app", "web").unwrap();
    let found = web.type_lookup().lookup_service(&TypeName::new("Clock"));
    assert_eq!(found.is_some(), visible);
}

#[test]
fn test_used_layer_service_is_invocable() {
    let application = clock_application(Visibility::Application);
    let web = application.module("app", "web").unwrap();
    let clock = web.find_service("Clock").unwrap();
    assert_eq!(clock.identity(), "Clock");
    assert_eq!(clock.invoke("now", vec![]).unwrap(), json!(1_700_000_000));
}

#[test]
fn test_lower_layer_cannot_see_upper_layer() {
    let mut assembly = ApplicationAssembly::new("Layers", support::universe());
    assembly
        .layer("app")
        .uses("infra")
        .module("web")
        .service("Clock")
        .visible_in(Visibility::Application);
    assembly.layer("infra").module("time");
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();

    let time = application.module("infra", "time").unwrap();
    assert!(time.find_service("Clock").is_err());
}

#[test]
fn test_layer_visibility_reaches_sibling_module() {
    let mut assembly = ApplicationAssembly::new("Siblings", support::universe());
    let layer = assembly.layer("domain");
    layer.module("greetings").transient("Greeter").visible_in(Visibility::Layer);
    layer.module("web");
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();

    let web = application.module("domain", "web").unwrap();
    let greeter = web.new_transient("Greeter").unwrap();
    assert_eq!(greeter.invoke("greet", vec![json!("Ada")]).unwrap(), json!("Good day, Ada"));
}

#[test]
fn test_narrower_scope_wins_over_wider_scope() {
    let mut assembly = ApplicationAssembly::new("Shadowing", support::universe());
    let layer = assembly.layer("domain");
    layer
        .module("polite")
        .transient("Greeter")
        .with_mixins(["PoliteGreeter"])
        .visible_in(Visibility::Layer);
    layer
        .module("rude")
        .transient("Greeter")
        .with_mixins(["RudeGreeter"]);
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();

    let rude = application.module("domain", "rude").unwrap();
    let greeter = rude.new_transient("Greeter").unwrap();
    assert_eq!(greeter.invoke("greet", vec![json!("Bob")]).unwrap(), json!("What, Bob?"));
}

#[test]
fn test_same_rank_candidates_are_ambiguous() {
    let mut assembly = ApplicationAssembly::new("Ambiguous", support::universe());
    let layer = assembly.layer("domain");
    layer
        .module("polite")
        .transient("Greeter")
        .with_mixins(["PoliteGreeter"])
        .visible_in(Visibility::Layer);
    layer
        .module("rude")
        .transient("Greeter")
        .with_mixins(["RudeGreeter"])
        .visible_in(Visibility::Layer);
    layer.module("web");
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();

    let web = application.module("domain", "web").unwrap();
    let err = web.type_lookup().lookup_transient(&TypeName::new("Greeter")).unwrap_err();
    let LookupError::AmbiguousType { requested, visibility, candidates } = err;
    assert_eq!(requested, TypeName::new("Greeter"));
    assert_eq!(visibility, Visibility::Layer);
    assert_eq!(candidates.len(), 2);
}

#[test]
fn test_unique_module_match_ignores_wider_ties() {
    let mut assembly = ApplicationAssembly::new("Shadowing", support::universe());
    let web = assembly.layer("domain").module("web");
    web.transient("Greeter")
        .with_mixins(["PoliteGreeter"])
        .visible_in(Visibility::Module);
    web.transient("Greeter")
        .with_mixins(["RudeGreeter"])
        .visible_in(Visibility::Application);
    web.transient("Greeter")
        .with_mixins(["RudeGreeter"])
        .visible_in(Visibility::Application);
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();

    let web = application.module("domain", "web").unwrap();
    let greeter = web.new_transient("Greeter").unwrap();
    assert_eq!(greeter.invoke("greet", vec![json!("Ada")]).unwrap(), json!("Good day, Ada"));
}

#[test]
fn test_three_way_tie_lists_every_candidate() {
    let mut assembly = ApplicationAssembly::new("Ambiguous", support::universe());
    let layer = assembly.layer("domain");
    for name in ["first", "second", "third"] {
        layer.module(name).transient("Greeter").visible_in(Visibility::Layer);
    }
    layer.module("web");
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();

    let web = application.module("domain", "web").unwrap();
    let err = web.type_lookup().lookup_transient(&TypeName::new("Greeter")).unwrap_err();
    let LookupError::AmbiguousType { visibility, candidates, .. } = err;
    assert_eq!(visibility, Visibility::Layer);
    assert_eq!(candidates.len(), 3);
}
