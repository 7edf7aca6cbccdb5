//! Fragment resolution is a pure function of the declarations

mod support;

use cim_composite::fragment::FragmentClass;
use cim_composite::structure::{ApplicationAssembly, CompositeAssembler};
use cim_composite::{ApplicationModel, ApplicationModelFactory, TypeUniverse};
use proptest::prelude::*;
use std::sync::Arc;

const GREETERS: [&str; 2] = ["PoliteGreeter", "RudeGreeter"];
const CONCERNS: [&str; 4] = ["Audit", "Timing", "Retry", "Cache"];

fn universe() -> Arc<TypeUniverse> {
    let mut builder = support::universe_builder();
    for name in CONCERNS {
        builder = builder.fragment(FragmentClass::stateless_concern(name, |inv, next| next.proceed(inv)));
    }
    Arc::new(builder.build().unwrap())
}

fn greeter_model(universe: &Arc<TypeUniverse>, mixins: &[&str], concerns: &[&str]) -> Arc<ApplicationModel> {
    let mut assembly = ApplicationAssembly::new("Greetings", universe.clone());
    assembly
        .layer("domain")
        .module("greetings")
        .transient("Greeter")
        .with_mixins(mixins.iter().copied())
        .with_concerns(concerns.iter().copied());
    ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
}

fn resolved(model: &ApplicationModel) -> (String, Vec<String>) {
    let greeter = model.find_module("domain", "greetings").unwrap().transients()[0].model();
    let greet = greeter.find_method("greet").unwrap();
    (
        greeter.mixins()[greet.mixin_index()].name().to_string(),
        greet.concern_names().into_iter().map(ToString::to_string).collect(),
    )
}

/// Distinct names ordered by their last occurrence
fn by_last_occurrence(names: &[&str]) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::new();
    for name in names {
        ordered.retain(|n| n != name);
        ordered.push(name.to_string());
    }
    ordered
}

proptest! {
    #[test]
    fn first_explicit_mixin_wins(picks in prop::collection::vec(0..GREETERS.len(), 0..5)) {
        let mixins: Vec<&str> = picks.iter().map(|&i| GREETERS[i]).collect();
        let model = greeter_model(&universe(), &mixins, &[]);
        let (mixin, _) = resolved(&model);
        let expected = mixins.first().copied().unwrap_or("PoliteGreeter");
        prop_assert_eq!(mixin, expected);
    }

    #[test]
    fn repeated_concerns_keep_last_position(picks in prop::collection::vec(0..CONCERNS.len(), 0..8)) {
        let concerns: Vec<&str> = picks.iter().map(|&i| CONCERNS[i]).collect();
        let model = greeter_model(&universe(), &[], &concerns);
        let (_, chain) = resolved(&model);
        prop_assert_eq!(chain, by_last_occurrence(&concerns));
    }

    #[test]
    fn rebuilding_yields_the_same_resolution(
        mixin_picks in prop::collection::vec(0..GREETERS.len(), 0..4),
        concern_picks in prop::collection::vec(0..CONCERNS.len(), 0..6),
    ) {
        let universe = universe();
        let mixins: Vec<&str> = mixin_picks.iter().map(|&i| GREETERS[i]).collect();
        let concerns: Vec<&str> = concern_picks.iter().map(|&i| CONCERNS[i]).collect();
        let first = resolved(&greeter_model(&universe, &mixins, &concerns));
        let second = resolved(&greeter_model(&universe, &mixins, &concerns));
        prop_assert_eq!(first, second);
    }
}
