//! Application assembly, service identities, activation and injection

mod support;

use cim_composite::fragment::{ObjectClass, ServiceImporter};
use cim_composite::model::DependencyDeclaration;
use cim_composite::spi::MemoryEntityStore;
use cim_composite::types::{MethodDeclaration, TypeDescriptor, ValueType};
use cim_composite::structure::{
    ApplicationAssembly, CompositeAssembler, ImportedServiceModel, SUPPORT_LAYER, SUPPORT_MODULE,
};
use cim_composite::{
    ApplicationConfig, ApplicationModelFactory, AssemblyError, BindingError, ErrorKind,
    RuntimeError, Uses, Visibility,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use support::{ACCOUNTS_MODULE, DOMAIN_LAYER};

trait Mailer: Send + Sync {
    fn send(&self, to: &str) -> String;
}

struct ConsoleMailer {
    sender: String,
}

impl Mailer for ConsoleMailer {
    fn send(&self, to: &str) -> String {
        format!("{} -> {to}", self.sender)
    }
}

/// Sender address read from the imported service meta info
#[derive(Debug, Clone)]
struct Sender(String);

struct MailerImporter {
    imports: Arc<AtomicUsize>,
}

impl ServiceImporter for MailerImporter {
    fn import(&self, service: &ImportedServiceModel) -> anyhow::Result<Arc<dyn Any + Send + Sync>> {
        self.imports.fetch_add(1, Ordering::SeqCst);
        let sender = service
            .meta_info()
            .get::<Sender>()
            .map(|s| s.0.clone())
            .unwrap_or_else(|| "noreply".to_string());
        let mailer: Arc<dyn Mailer> = Arc::new(ConsoleMailer { sender });
        Ok(Arc::new(mailer))
    }
}

/// Report produced by an object that depends on the clock service
#[derive(Debug)]
struct Report {
    generated_at: i64,
}

#[derive(Debug)]
struct Banner {
    text: String,
}

fn mail_application(imports: Arc<AtomicUsize>, on_startup: bool) -> cim_composite::Application {
    let universe = support::universe_builder()
        .object(ObjectClass::new("MailerImporter", move |_| {
            let importer: Arc<dyn ServiceImporter> = Arc::new(MailerImporter {
                imports: imports.clone(),
            });
            Ok(Arc::new(importer) as Arc<dyn Any + Send + Sync>)
        }))
        .build()
        .unwrap();
    let mut assembly = ApplicationAssembly::new("Mail", Arc::new(universe));
    let imported = assembly
        .layer("infra")
        .module("mail")
        .imported_service("Mailer");
    imported
        .imported_by("MailerImporter")
        .set_meta_info(Sender("bank@example.org".to_string()));
    if on_startup {
        imported.instantiate_on_startup();
    }
    ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance()
}

#[test]
fn test_duplicate_service_identity_is_rejected() {
    let mut assembly = ApplicationAssembly::new("Clocks", support::universe());
    let module = assembly.layer("infra").module("time");
    module.service("Clock").identified_by("X");
    module.service("Clock").identified_by("X");

    let err = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap_err();
    assert!(matches!(err, AssemblyError::DuplicateServiceIdentity { .. }));
    assert_eq!(err.kind(), ErrorKind::BuildTime);
    let message = err.to_string();
    assert!(message.contains("X"), "{message}");
    assert!(message.contains("time"), "{message}");
}

#[test]
fn test_service_build_failure_precedes_identity_check() {
    let universe = support::universe_builder()
        .register(TypeDescriptor::interface("Pager").method(MethodDeclaration::new("page").returns(ValueType::String)))
        .build()
        .unwrap();
    let mut assembly = ApplicationAssembly::new("Paging", Arc::new(universe));
    let module = assembly.layer("infra").module("alerts");
    module.service("Clock").identified_by("X");
    module.service("Pager").identified_by("X");

    let err = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap_err();
    assert!(matches!(err, AssemblyError::UnresolvedFragment { .. }), "{err}");
}

#[test]
fn test_undeclared_identities_are_generated() {
    let mut assembly = ApplicationAssembly::new("Clocks", support::universe());
    let module = assembly.layer("infra").module("time");
    module.service("Clock");
    module.service("Clock");
    module.service("Clock").identified_by("Clock_1_backup");

    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap();
    let identities: Vec<&str> = application
        .find_module("infra", "time")
        .unwrap()
        .services()
        .iter()
        .map(|s| s.identity())
        .collect();
    assert_eq!(identities, vec!["Clock", "Clock_1", "Clock_1_backup"]);
}

#[test]
fn test_support_layer_supplies_missing_ports() {
    let store = MemoryEntityStore::new();
    let application = support::application(&store);
    let model = application.model();

    let support_layer = model.layer(SUPPORT_LAYER).unwrap();
    assert!(support_layer.module(SUPPORT_MODULE).is_some());
    let domain = model.layer(DOMAIN_LAYER).unwrap();
    assert!(domain.used_layers().contains(&support_layer.index()));

    let accounts = support::accounts(&application);
    assert!(accounts.identity_generator().is_ok());
    assert!(accounts.value_serialization().is_ok());
}

#[test]
fn test_support_layer_can_be_disabled() {
    let config = ApplicationConfig {
        spi_defaults: false,
        ..ApplicationConfig::named("Bare")
    };
    let mut assembly = ApplicationAssembly::from_config(config, support::universe());
    support::declare_domain(assembly.layer(DOMAIN_LAYER).module(ACCOUNTS_MODULE));
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap();

    assert!(application.layer(SUPPORT_LAYER).is_none());
    let accounts = application.new_instance().module(DOMAIN_LAYER, ACCOUNTS_MODULE).unwrap();
    let Err(err) = accounts.identity_generator() else {
        panic!("identity generator should not be visible");
    };
    assert!(err.is_not_found());
}

#[test]
fn test_description_outlines_the_structure() {
    let mut assembly = ApplicationAssembly::new("Bank", support::universe());
    assembly.set_version("2.1.0");
    let module = assembly.layer(DOMAIN_LAYER).module(ACCOUNTS_MODULE);
    module.transient("Greeter").visible_in(Visibility::Layer);
    module.service("Clock");
    let description = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .describe();

    assert_eq!(description.name, "Bank");
    assert_eq!(description.version, "2.1.0");
    let layers: Vec<&str> = description.layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(layers, vec![DOMAIN_LAYER, SUPPORT_LAYER]);
    assert_eq!(description.layers[0].uses, vec![SUPPORT_LAYER.to_string()]);

    let accounts = &description.layers[0].modules[0];
    assert_eq!(accounts.name, ACCOUNTS_MODULE);
    let greeter = &accounts.composites[0];
    assert_eq!(greeter.visibility, Visibility::Layer);
    assert_eq!(greeter.methods.len(), 1);
    assert_eq!(greeter.methods[0].signature, "Greeter.greet(String)");
    assert_eq!(greeter.methods[0].mixin, "PoliteGreeter");

    let clock = &accounts.services[0];
    assert_eq!(clock.identity, "Clock");
    assert_eq!(clock.importer, None);
    assert_eq!(clock.composite.as_ref().unwrap().methods[0].mixin, "FixedClock");

    let ports: Vec<&str> = description.layers[1].modules[0]
        .services
        .iter()
        .map(|s| s.identity.as_str())
        .collect();
    assert_eq!(ports, vec!["IdentityGenerator", "ValueSerialization"]);
}

#[test]
fn test_services_on_startup_activate_with_application() {
    let mut assembly = ApplicationAssembly::new("Clocks", support::universe());
    let module = assembly.layer("infra").module("time");
    module.service("Clock").identified_by("eager").instantiate_on_startup();
    module.service("Clock").identified_by("lazy");
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();
    let time = application.module("infra", "time").unwrap();
    let eager = time.service("eager").unwrap();
    let lazy = time.service("lazy").unwrap();

    application.activate().unwrap();
    assert!(eager.is_active());
    assert!(!lazy.is_active());

    assert_eq!(lazy.invoke("now", vec![]).unwrap(), json!(1_700_000_000));
    assert!(lazy.is_active());

    application.passivate();
    assert!(!eager.is_active());
    assert!(!lazy.is_active());
}

#[test]
fn test_custom_importer_produces_native_service() {
    let imports = Arc::new(AtomicUsize::new(0));
    let application = mail_application(imports.clone(), false);
    let mail = application.module("infra", "mail").unwrap();

    let reference = mail.find_service("Mailer").unwrap();
    assert_eq!(reference.identity(), "Mailer");
    assert!(!reference.is_active());
    assert_eq!(imports.load(Ordering::SeqCst), 0);

    let mailer = reference.native::<dyn Mailer>().unwrap();
    assert_eq!(mailer.send("ada@example.org"), "bank@example.org -> ada@example.org");
    assert!(reference.is_available());

    reference.native::<dyn Mailer>().unwrap();
    assert_eq!(imports.load(Ordering::SeqCst), 1);
}

#[test]
fn test_imported_service_on_startup_is_imported_by_activation() {
    let imports = Arc::new(AtomicUsize::new(0));
    let application = mail_application(imports.clone(), true);

    application.activate().unwrap();
    assert_eq!(imports.load(Ordering::SeqCst), 1);

    application.passivate();
    application.activate().unwrap();
    assert_eq!(imports.load(Ordering::SeqCst), 2);
}

#[test]
fn test_imported_service_is_not_a_composite() {
    let application = mail_application(Arc::new(AtomicUsize::new(0)), false);
    let reference = application.module("infra", "mail").unwrap().find_service("Mailer").unwrap();

    let err = reference.invoke("send", vec![json!("ada")]).unwrap_err();
    assert!(matches!(err, RuntimeError::ServiceUnavailable { .. }));
}

#[test]
fn test_object_receives_service_dependency() {
    let universe = support::universe_builder()
        .object(
            ObjectClass::new("ReportWriter", |ctx| {
                let now = ctx.service("clock")?.invoke("now", vec![])?;
                Ok(Arc::new(Report {
                    generated_at: now.as_i64().unwrap_or_default(),
                }) as Arc<dyn Any + Send + Sync>)
            })
            .depends_on(DependencyDeclaration::service("clock", "Clock")),
        )
        .build()
        .unwrap();
    let mut assembly = ApplicationAssembly::new("Reports", Arc::new(universe));
    let layer = assembly.layer("reports");
    layer.uses("infra").module("writers").object("ReportWriter");
    assembly
        .layer("infra")
        .module("time")
        .service("Clock")
        .visible_in(Visibility::Application);
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();

    let writers = application.module("reports", "writers").unwrap();
    let report = writers.new_object_as::<Report>("ReportWriter", &Uses::new()).unwrap();
    assert_eq!(report.generated_at, 1_700_000_000);
}

#[test]
fn test_unresolved_service_dependency_fails_binding() {
    let universe = support::universe_builder()
        .object(
            ObjectClass::new("Newsletter", |_| Ok(Arc::new(()) as Arc<dyn Any + Send + Sync>))
                .depends_on(DependencyDeclaration::service("mailer", "Mailer")),
        )
        .build()
        .unwrap();
    let mut assembly = ApplicationAssembly::new("News", Arc::new(universe));
    assembly.layer("app").module("news").object("Newsletter");

    let err = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BindTime);
    let AssemblyError::Binding { application, source } = err else {
        panic!("expected a binding error");
    };
    assert_eq!(application, "News");
    assert!(matches!(source, BindingError::UnresolvedDependency { .. }));
}

#[test]
fn test_optional_service_dependency_binds_to_nothing() {
    let universe = support::universe_builder()
        .object(
            ObjectClass::new("Newsletter", |ctx| {
                let mailer = ctx.optional_service("mailer")?;
                Ok(Arc::new(mailer.is_none()) as Arc<dyn Any + Send + Sync>)
            })
            .depends_on(DependencyDeclaration::service("mailer", "Mailer").optional()),
        )
        .build()
        .unwrap();
    let mut assembly = ApplicationAssembly::new("News", Arc::new(universe));
    assembly.layer("app").module("news").object("Newsletter");
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();

    let news = application.module("app", "news").unwrap();
    let absent = news.new_object_as::<bool>("Newsletter", &Uses::new()).unwrap();
    assert!(*absent);
}

#[test]
fn test_uses_dependency_must_be_supplied() {
    let universe = support::universe_builder()
        .object(
            ObjectClass::new("BannerPrinter", |ctx| {
                let greeting = ctx.uses::<String>("greeting")?;
                Ok(Arc::new(Banner {
                    text: format!("*** {greeting} ***"),
                }) as Arc<dyn Any + Send + Sync>)
            })
            .depends_on(DependencyDeclaration::uses("greeting", "Greeting")),
        )
        .build()
        .unwrap();
    let mut assembly = ApplicationAssembly::new("Banners", Arc::new(universe));
    assembly.layer("app").module("banners").object("BannerPrinter");
    let application = ApplicationModelFactory::new()
        .new_application_model(assembly)
        .unwrap()
        .new_instance();
    let banners = application.module("app", "banners").unwrap();

    let err = banners.new_object("BannerPrinter", &Uses::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::MissingUses { .. }));
    assert_eq!(err.kind(), ErrorKind::Usage);

    let uses = Uses::new().with("Greeting", "Welcome".to_string());
    let banner = banners.new_object_as::<Banner>("BannerPrinter", &uses).unwrap();
    assert_eq!(banner.text, "*** Welcome ***");
}

#[test]
fn test_application_config_from_json() {
    let config = ApplicationConfig::from_json(
        r#"{"name": "Bank", "version": "1.2.0", "mode": "test", "unit_of_work": {"prune_on_pause": true}}"#,
    )
    .unwrap();
    let application = ApplicationModelFactory::new()
        .new_application_model(ApplicationAssembly::from_config(config, support::universe()))
        .unwrap();

    assert_eq!(application.name(), "Bank");
    assert_eq!(application.version(), "1.2.0");
    assert_eq!(application.mode(), cim_composite::ApplicationMode::Test);
    assert!(application.config().unit_of_work.prune_on_pause);
    assert!(application.config().spi_defaults);
}
