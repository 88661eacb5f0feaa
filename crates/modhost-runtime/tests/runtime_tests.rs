use std::cell::{Cell, RefCell};
use std::rc::Rc;

use modhost_core::{ComponentDescriptor, Event, SetupResult, Table, Value, Version};
use modhost_runtime::{
    Catalog, ErrorKind, HostConfig, HostEntry, LoadStatus, ManifestCatalog, Registry,
    RegistryError,
};
use serde::Deserialize;

fn registry(catalog: Catalog) -> Registry {
    Registry::new(catalog, HostConfig::default())
}

fn table<const N: usize>(entries: [(&str, Value); N]) -> Table {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[test]
fn test_loading_twice_runs_setup_once() {
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let catalog = Catalog::new().with(
        ComponentDescriptor::builder("core.base")
            .setup(move || {
                counter.set(counter.get() + 1);
                Some(SetupResult::ok())
            })
            .build(),
    );
    let mut registry = registry(catalog);

    assert_eq!(registry.load("core.base").unwrap(), LoadStatus::Loaded);
    assert_eq!(registry.load("core.base").unwrap(), LoadStatus::AlreadyLoaded);
    assert_eq!(calls.get(), 1);
    assert_eq!(registry.loaded_count(), 1);
}

#[test]
fn test_required_api_matches_dependency_public_api() {
    let catalog = Catalog::new()
        .with(
            ComponentDescriptor::builder("core.base")
                .public("width", 80)
                .public("name", "base")
                .build(),
        )
        .with(ComponentDescriptor::builder("core.ui").requires("core.base").build());
    let mut registry = registry(catalog);
    registry.load("core.ui").unwrap();

    let ui = registry.get("core.ui").unwrap();
    assert_eq!(
        ui.required_api("core.base").unwrap().table(),
        registry.get_public_api("core.base").unwrap()
    );
}

#[test]
fn test_diamond_dependency_loads_shared_base_once() {
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let catalog = Catalog::new()
        .with(
            ComponentDescriptor::builder("core.base")
                .setup(move || {
                    counter.set(counter.get() + 1);
                    Some(SetupResult::ok())
                })
                .build(),
        )
        .with(ComponentDescriptor::builder("core.left").requires("core.base").build())
        .with(ComponentDescriptor::builder("core.right").requires("core.base").build())
        .with(
            ComponentDescriptor::builder("core.top")
                .requires("core.left")
                .requires("core.right")
                .build(),
        );
    let mut registry = registry(catalog);
    registry.load("core.top").unwrap();

    assert_eq!(calls.get(), 1);
    let order: Vec<&str> = registry.loaded_names().collect();
    assert_eq!(order, vec!["core.base", "core.left", "core.right", "core.top"]);
}

#[test]
fn test_failed_dependency_leaves_no_partial_entry() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("core.ok").build())
        .with(
            ComponentDescriptor::builder("core.broken")
                .setup(|| Some(SetupResult::failed()))
                .build(),
        )
        .with(
            ComponentDescriptor::builder("core.ui")
                .requires("core.ok")
                .requires("core.broken")
                .build(),
        );
    let mut registry = registry(catalog);

    let err = registry.load("core.ui").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyLoadFailed);
    assert_eq!(err.root_cause().kind(), ErrorKind::SetupFailed);

    assert!(!registry.is_loaded("core.ui"));
    assert!(!registry.is_loaded("core.broken"));
    // Dependencies that finished loading stay loaded.
    assert!(registry.is_loaded("core.ok"));
    assert_eq!(registry.loaded_count(), 1);
}

#[test]
fn test_want_must_be_enabled_by_host() {
    let catalog = || {
        Catalog::new()
            .with(ComponentDescriptor::builder("core.theme").public("accent", "blue").build())
            .with(ComponentDescriptor::builder("core.ui").wants("core.theme").build())
    };

    let mut strict = registry(catalog());
    let err = strict.load("core.ui").unwrap_err();
    assert!(matches!(
        &err,
        RegistryError::UnsatisfiedWant { component, want }
            if component == "core.ui" && want == "core.theme"
    ));
    assert!(!strict.is_loaded("core.ui"));
    assert!(!strict.is_loaded("core.theme"));

    let mut enabled = Registry::new(catalog(), HostConfig::default().enable("core.theme"));
    enabled.load("core.ui").unwrap();
    assert!(enabled.is_loaded("core.theme"));
    assert!(enabled.get("core.ui").unwrap().required_api("core.theme").is_some());
}

#[test]
fn test_want_already_loaded_needs_no_host_entry() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("core.theme").build())
        .with(ComponentDescriptor::builder("core.ui").wants("core.theme").build());
    let mut registry = registry(catalog);

    registry.load("core.theme").unwrap();
    registry.load("core.ui").unwrap();
    assert!(registry.get("core.ui").unwrap().required_api("core.theme").is_some());
}

#[test]
fn test_replacement_takes_over_name_and_dependents() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("core.theme").public("accent", "blue").build())
        .with(ComponentDescriptor::builder("core.ui").requires("core.theme").build())
        .with(
            ComponentDescriptor::builder("core.theme2")
                .replaces("core.theme")
                .public("accent", "red")
                .build(),
        );
    let mut registry = registry(catalog);
    registry.load("core.ui").unwrap();
    registry.load("core.theme2").unwrap();

    let theme = registry.get("core.theme").unwrap();
    assert_eq!(theme.name(), "core.theme");
    assert_eq!(theme.origin(), "core.theme2");
    assert!(theme.is_replaced());
    assert!(!registry.is_loaded("core.theme"));
    assert!(registry.is_loaded("core.theme2"));

    let wired = registry.get("core.ui").unwrap().required_api("core.theme").unwrap();
    assert_eq!(wired.get("accent"), Some(&Value::from("red")));

    // Loading the replaced name again is a no-op.
    assert_eq!(registry.load("core.theme").unwrap(), LoadStatus::AlreadyLoaded);
}

#[test]
fn test_double_replacement_is_rejected() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("core.theme").build())
        .with(ComponentDescriptor::builder("core.theme2").replaces("core.theme").build())
        .with(ComponentDescriptor::builder("core.theme3").replaces("core.theme").build());
    let mut registry = registry(catalog);
    registry.load("core.theme").unwrap();
    registry.load("core.theme2").unwrap();

    let err = registry.load("core.theme3").unwrap_err();
    assert!(matches!(
        &err,
        RegistryError::DoubleReplacement { component, target }
            if component == "core.theme3" && target == "core.theme"
    ));
    assert!(!registry.is_loaded("core.theme3"));
    assert_eq!(registry.get("core.theme").unwrap().origin(), "core.theme2");
}

#[test]
fn test_replace_merge_keeps_new_values() {
    let catalog = Catalog::new()
        .with(
            ComponentDescriptor::builder("core.theme")
                .public("accent", "blue")
                .public("font", "mono")
                .private("cache", 3)
                .build(),
        )
        .with(
            ComponentDescriptor::builder("core.theme2")
                .replaces("core.theme")
                .replace_merge(true)
                .public("accent", "red")
                .build(),
        );
    let mut registry = registry(catalog);
    registry.load("core.theme").unwrap();
    registry.load("core.theme2").unwrap();

    let theme = registry.get("core.theme").unwrap();
    assert_eq!(theme.public_api().get("accent"), Some(&Value::from("red")));
    assert_eq!(theme.public_api().get("font"), Some(&Value::from("mono")));
    assert_eq!(theme.private_state().get("cache"), Some(&Value::from(3)));
}

#[test]
fn test_replacing_unloaded_target_claims_the_name() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("core.theme").public("accent", "blue").build())
        .with(ComponentDescriptor::builder("core.theme2").replaces("core.theme").build());
    let mut registry = registry(catalog);

    registry.load("core.theme2").unwrap();
    assert_eq!(registry.load("core.theme").unwrap(), LoadStatus::AlreadyLoaded);
    assert_eq!(registry.get("core.theme").unwrap().origin(), "core.theme2");
    assert_eq!(registry.loaded_count(), 1);
}

#[test]
fn test_await_fires_once_after_load() {
    let catalog = Catalog::new().with(ComponentDescriptor::builder("core.base").public("width", 80).build());
    let mut registry = registry(catalog);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let fired_now = registry.await_component("core.base", move |api| {
        sink.borrow_mut().push(api.get("width").cloned());
    });
    assert!(!fired_now);
    assert!(seen.borrow().is_empty());

    registry.load("core.base").unwrap();
    registry.load("core.base").unwrap();
    assert_eq!(*seen.borrow(), vec![Some(Value::from(80))]);
}

#[test]
fn test_await_fires_immediately_when_loaded() {
    let catalog = Catalog::new().with(ComponentDescriptor::builder("core.base").build());
    let mut registry = registry(catalog);
    registry.load("core.base").unwrap();

    let hits = Rc::new(Cell::new(0));
    let counter = hits.clone();
    assert!(registry.await_component("core.base", move |_| counter.set(counter.get() + 1)));
    assert_eq!(hits.get(), 1);
}

#[test]
fn test_await_ignores_other_components() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("core.base").build())
        .with(ComponentDescriptor::builder("core.ui").requires("core.base").build());
    let mut registry = registry(catalog);

    let hits = Rc::new(Cell::new(0));
    let counter = hits.clone();
    registry.await_component("core.ui", move |_| counter.set(counter.get() + 1));

    registry.load("core.base").unwrap();
    assert_eq!(hits.get(), 0);
    registry.load("core.ui").unwrap();
    assert_eq!(hits.get(), 1);
}

#[test]
fn test_await_by_replaced_name() {
    let catalog = Catalog::new().with(
        ComponentDescriptor::builder("core.theme2")
            .replaces("core.theme")
            .public("accent", "red")
            .build(),
    );
    let mut registry = registry(catalog);

    let accent = Rc::new(RefCell::new(None));
    let sink = accent.clone();
    registry.await_component("core.theme", move |api| {
        *sink.borrow_mut() = api.get("accent").cloned();
    });
    registry.load("core.theme2").unwrap();
    assert_eq!(*accent.borrow(), Some(Value::from("red")));
}

#[test]
fn test_chain_loads_in_dependency_order() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("top").requires("mid").build())
        .with(ComponentDescriptor::builder("mid").requires("base").build())
        .with(ComponentDescriptor::builder("base").build());
    let mut registry = registry(catalog);

    let announced = Rc::new(RefCell::new(Vec::new()));
    let sink = announced.clone();
    registry.on_loaded(move |component| sink.borrow_mut().push(component.name().to_string()));

    registry.load("top").unwrap();
    assert_eq!(*announced.borrow(), vec!["base", "mid", "top"]);
    assert_eq!(registry.loaded_count(), 3);
}

#[test]
fn test_cycle_is_detected_and_rolled_back() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("a").requires("b").build())
        .with(ComponentDescriptor::builder("b").requires("c").build())
        .with(ComponentDescriptor::builder("c").requires("a").build());
    let mut registry = registry(catalog);

    let err = registry.load("a").unwrap_err();
    match err {
        RegistryError::CycleDetected { path } => assert_eq!(path, vec!["a", "b", "c", "a"]),
        other => panic!("expected a cycle, got {other}"),
    }
    assert_eq!(registry.loaded_names().count(), 0);
}

/// Mutually wanting components are rejected even when both are enabled.
/// The tentative entry of `a` does not satisfy `b`'s want while `a` is
/// still resolving, so the pair never half-loads against each other.
#[test]
fn test_want_cycle_is_detected() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("a").wants("b").build())
        .with(ComponentDescriptor::builder("b").wants("a").build());
    let host = HostConfig::default().enable("a").enable("b");
    let mut registry = Registry::new(catalog, host);

    let err = registry.load("a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CycleDetected);
    assert!(!registry.is_loaded("a"));
    assert!(!registry.is_loaded("b"));
}

#[test]
fn test_imports_fold_sub_components() {
    let catalog = Catalog::new()
        .with(
            ComponentDescriptor::builder("core.editor")
                .imports("keys")
                .imports("motions")
                .public("mode", "normal")
                .build(),
        )
        .with(
            ComponentDescriptor::builder("core.editor.keys")
                .public("leader", " ")
                .public("mode", "insert")
                .build(),
        )
        .with(ComponentDescriptor::builder("core.editor.motions").public("word", "w").build());
    let mut registry = registry(catalog);
    registry.load("core.editor").unwrap();

    let editor = registry.get("core.editor").unwrap();
    assert_eq!(editor.imported(), ["core.editor.keys", "core.editor.motions"]);
    assert_eq!(editor.public_api().get("mode"), Some(&Value::from("normal")));
    assert_eq!(editor.public_api().get("leader"), Some(&Value::from(" ")));
    assert_eq!(editor.public_api().get("word"), Some(&Value::from("w")));
}

#[test]
fn test_missing_import() {
    let catalog = Catalog::new().with(ComponentDescriptor::builder("core.editor").imports("keys").build());
    let mut registry = registry(catalog);

    let err = registry.load("core.editor").unwrap_err();
    assert!(matches!(
        &err,
        RegistryError::ImportNotFound { import, .. } if import == "core.editor.keys"
    ));
    assert!(!registry.is_loaded("core.editor"));
}

#[test]
fn test_host_config_overrides_defaults() {
    let catalog = Catalog::new().with(
        ComponentDescriptor::builder("core.ui")
            .config("theme", "light")
            .config("width", 80)
            .build(),
    );
    let host = HostConfig::default().with_entry(
        "core.ui",
        HostEntry::with_config(table([("theme", Value::from("dark"))])),
    );
    let mut registry = Registry::new(catalog, host);
    registry.load("core.ui").unwrap();

    let config = registry.get_config("core.ui").unwrap();
    assert_eq!(config.get("theme"), Some(&Value::from("dark")));
    assert_eq!(config.get("width"), Some(&Value::from(80)));

    let ui = registry.get("core.ui").unwrap();
    assert_eq!(ui.config().default.get("theme"), Some(&Value::from("light")));
}

#[test]
fn test_version_query() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("core.base").version("2.1.0").build())
        .with(ComponentDescriptor::builder("core.plain").build());
    let mut registry = registry(catalog);
    registry.load("core.base").unwrap();
    registry.load("core.plain").unwrap();

    assert_eq!(registry.get_version("core.base"), Some(Version::new(2, 1, 0)));
    assert_eq!(registry.get_version("core.plain"), None);
    assert_eq!(registry.get_version("core.unloaded"), None);
}

#[test]
fn test_typed_public_api() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Theme {
        accent: String,
        size: i64,
    }

    let catalog = Catalog::new().with(
        ComponentDescriptor::builder("core.theme")
            .public("accent", "blue")
            .public("size", 12)
            .build(),
    );
    let mut registry = registry(catalog);
    registry.load("core.theme").unwrap();

    let theme: Theme = registry.get_public_api_as("core.theme").unwrap();
    assert_eq!(
        theme,
        Theme {
            accent: "blue".into(),
            size: 12
        }
    );

    let err = registry.get_public_api_as::<Theme>("core.missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotLoaded);
}

#[test]
fn test_load_hook_runs_after_wiring() {
    let catalog = Catalog::new()
        .with(ComponentDescriptor::builder("core.base").public("width", 80).build())
        .with(
            ComponentDescriptor::builder("core.ui")
                .requires("core.base")
                .on_load(|ctx| {
                    let width = ctx
                        .required("core.base")
                        .and_then(|api| api.get("width"))
                        .and_then(Value::as_i64)
                        .unwrap_or_default();
                    ctx.private_mut().insert("half".into(), Value::from(width / 2));
                })
                .build(),
        );
    let mut registry = registry(catalog);
    registry.load("core.ui").unwrap();

    assert_eq!(
        registry.get("core.ui").unwrap().private_state().get("half"),
        Some(&Value::from(40))
    );
}

#[test]
fn test_user_events() {
    let counter = |name: &str| {
        ComponentDescriptor::builder(name)
            .subscribe("core.clock", "tick")
            .on_event(|_, ctx| {
                let ticks = ctx
                    .tables()
                    .private
                    .get("ticks")
                    .and_then(Value::as_i64)
                    .unwrap_or_default();
                ctx.private_mut().insert("ticks".into(), Value::from(ticks + 1));
            })
            .build()
    };
    let catalog = Catalog::new()
        .with(counter("core.status"))
        .with(counter("core.log"))
        .with(ComponentDescriptor::builder("core.quiet").build());
    let mut registry = registry(catalog);
    for name in ["core.status", "core.log", "core.quiet"] {
        registry.load(name).unwrap();
    }

    let tick = Event::new("core.clock", "tick");
    assert_eq!(registry.broadcast(&tick), 2);
    assert!(registry.send("core.status", &tick).unwrap());
    assert!(!registry.send("core.quiet", &tick).unwrap());
    assert_eq!(
        registry.send("core.missing", &tick).unwrap_err().kind(),
        ErrorKind::NotLoaded
    );

    let ticks = |name: &str| registry.get(name).unwrap().private_state().get("ticks").cloned();
    assert_eq!(ticks("core.status"), Some(Value::from(2)));
    assert_eq!(ticks("core.log"), Some(Value::from(1)));
}

#[test]
fn test_extend_inherits_parent_tables() {
    let catalog = Catalog::new().with(
        ComponentDescriptor::builder("core.theme")
            .public("accent", "blue")
            .public("font", "mono")
            .build(),
    );
    let mut registry = registry(catalog);
    registry.load("core.theme").unwrap();

    let child = registry
        .extend("core.theme.dark", "core.theme")
        .public("accent", "black")
        .build();
    registry.load_from_descriptor(child, None).unwrap();

    let dark = registry.get_public_api("core.theme.dark").unwrap();
    assert_eq!(dark.get("accent"), Some(&Value::from("black")));
    assert_eq!(dark.get("font"), Some(&Value::from("mono")));

    let orphan = registry.extend("core.orphan", "core.missing").build();
    assert!(orphan.tables().is_empty());
}

#[test]
fn test_manifest_directory_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("components.toml"),
        r#"
        [components."core.base"]
        public = { version = "1.0.0" }

        [components."core.ui"]
        requires = ["core.base"]
        wants = ["core.theme"]

        [components."core.theme"]
        public = { accent = "blue" }
        "#,
    )
    .unwrap();

    let catalog = ManifestCatalog::from_dir(dir.path()).unwrap();
    let host = HostConfig::from_toml_str("[load.\"core.theme\"]\n").unwrap();
    let mut registry = Registry::new(catalog, host);
    registry.load("core.ui").unwrap();

    let order: Vec<&str> = registry.loaded_names().collect();
    assert_eq!(order, vec!["core.theme", "core.base", "core.ui"]);
    assert_eq!(registry.get_version("core.base"), Some(Version::new(1, 0, 0)));
}
