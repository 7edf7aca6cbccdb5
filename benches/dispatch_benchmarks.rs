use cim_composite::fragment::FragmentClass;
use cim_composite::spi::MemoryEntityStore;
use cim_composite::structure::{ApplicationAssembly, CompositeAssembler};
use cim_composite::types::{MethodDeclaration, TypeDescriptor, ValueType};
use cim_composite::{ApplicationModelFactory, EntityState, TypeName, TypeUniverse};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;

fn universe(concerns: usize) -> Arc<TypeUniverse> {
    let mut builder = TypeUniverse::builder()
        .register(
            TypeDescriptor::interface("CounterState")
                .method(MethodDeclaration::property("count", ValueType::Integer)),
        )
        .register(
            TypeDescriptor::interface("CounterBehavior").method(
                MethodDeclaration::new("increment")
                    .param("by", ValueType::Integer)
                    .returns(ValueType::Integer),
            ),
        )
        .register(
            TypeDescriptor::interface("Counter")
                .extends("CounterState")
                .extends("CounterBehavior")
                .mixins(["CounterMixin"]),
        )
        .fragment(
            FragmentClass::stateless_mixin("CounterMixin", |invocation| {
                let this = invocation.this();
                let next = this.property("count")?.as_i64().unwrap_or(0) + invocation.arg(0).as_i64().unwrap_or(0);
                this.set_property("count", next)?;
                Ok(json!(next))
            })
            .implements("CounterBehavior"),
        );
    for i in 0..concerns {
        builder = builder.fragment(FragmentClass::stateless_concern(format!("Pass{i}"), |inv, next| {
            next.proceed(inv)
        }));
    }
    Arc::new(builder.build().unwrap())
}

fn assembly(universe: Arc<TypeUniverse>, concerns: usize, store: &MemoryEntityStore) -> ApplicationAssembly {
    let mut assembly = ApplicationAssembly::new("Bench", universe);
    let module = assembly.layer("domain").module("counters");
    module
        .transient("Counter")
        .with_concerns((0..concerns).map(|i| format!("Pass{i}")));
    module.entity("Counter");
    module.entity_store(Arc::new(store.clone()));
    assembly
}

fn benchmark_invoke_with_concerns(c: &mut Criterion) {
    let mut group = c.benchmark_group("invoke_with_concerns");

    for concerns in [0, 1, 4, 16] {
        let store = MemoryEntityStore::new();
        let application = ApplicationModelFactory::new()
            .new_application_model(assembly(universe(concerns), concerns, &store))
            .unwrap()
            .new_instance();
        let module = application.module("domain", "counters").unwrap();
        let mut builder = module.new_transient_builder("Counter").unwrap();
        builder.set("count", 0).unwrap();
        let counter = builder.new_instance().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(concerns), &concerns, |b, _| {
            b.iter(|| counter.invoke("increment", vec![black_box(json!(1))]).unwrap());
        });
    }

    group.finish();
}

fn benchmark_model_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("application_model_build");

    for concerns in [0, 4, 16] {
        let universe = universe(concerns);
        let store = MemoryEntityStore::new();
        group.bench_with_input(BenchmarkId::from_parameter(concerns), &concerns, |b, &concerns| {
            b.iter(|| {
                ApplicationModelFactory::new()
                    .new_application_model(assembly(universe.clone(), concerns, &store))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn benchmark_unit_of_work_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("unit_of_work_commit");

    for entities in [1, 10, 100] {
        let store = MemoryEntityStore::new();
        for i in 0..entities {
            store.insert(EntityState::new(
                format!("counter-{i}").into(),
                TypeName::new("Counter"),
                [("count".to_string(), json!(0))].into_iter().collect(),
            ));
        }
        let application = ApplicationModelFactory::new()
            .new_application_model(assembly(universe(0), 0, &store))
            .unwrap()
            .new_instance();
        let module = application.module("domain", "counters").unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(entities), &entities, |b, &entities| {
            b.iter(|| {
                let uow = module.new_unit_of_work();
                for i in 0..entities {
                    let counter = uow.get("Counter", format!("counter-{i}")).unwrap();
                    counter.invoke("increment", vec![json!(1)]).unwrap();
                }
                uow.complete().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_invoke_with_concerns,
    benchmark_model_build,
    benchmark_unit_of_work_commit
);
criterion_main!(benches);
