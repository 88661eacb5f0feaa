//! Component descriptors.
//!
//! A [`ComponentDescriptor`] is the static declaration of a named component:
//! its default capability tables, its event subscriptions and the hooks the
//! registry calls while loading it. Descriptors are built once with
//! [`DescriptorBuilder`] and cloned cheaply afterwards; hooks are shared.

use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::component::ComponentContext;
use crate::event::Event;
use crate::value::{MergePolicy, Table, Value, merge_tables};

/// Setup hook. Returning `None` is treated like an unsuccessful setup.
pub type SetupFn = Rc<dyn Fn() -> Option<SetupResult>>;

/// Late initialization hook, run once dependencies are wired.
pub type LoadFn = Rc<dyn Fn(&mut ComponentContext<'_>)>;

/// Event hook, run for every event the component subscribed to.
pub type EventFn = Rc<dyn Fn(&Event, &mut ComponentContext<'_>)>;

/// Outcome of a component's setup hook. Drives dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetupResult {
    /// Whether the component can be loaded at all.
    pub success: bool,

    /// Hard dependencies, loaded unconditionally before the component.
    pub requires: IndexSet<String>,

    /// Soft dependencies, loaded only when enabled by the host.
    pub wants: IndexSet<String>,

    /// Sub-components folded into this one, relative to its name.
    pub imports: Vec<String>,

    /// Name of a loaded component this one takes the place of.
    pub replaces: Option<String>,

    /// Whether the replaced component's tables are merged into this one.
    pub replace_merge: bool,
}

impl SetupResult {
    /// A successful setup with no dependencies.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// An unsuccessful setup.
    pub fn failed() -> Self {
        Self::default()
    }

    /// Add hard dependencies.
    pub fn with_requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add soft dependencies.
    pub fn with_wants<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wants.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add imports.
    pub fn with_imports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declare a replacement target.
    pub fn with_replaces(mut self, target: impl Into<String>, merge: bool) -> Self {
        self.replaces = Some(target.into());
        self.replace_merge = merge;
        self
    }

    /// Wanted dependencies followed by required ones, without duplicates.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        let mut seen = IndexSet::new();
        self.wants
            .iter()
            .chain(self.requires.iter())
            .filter(move |name: &&String| seen.insert(*name))
            .map(String::as_str)
    }
}

/// Configuration tables of a component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigTables {
    /// Configuration as declared by the component.
    #[serde(default)]
    pub default: Table,

    /// Effective configuration: defaults with all overrides applied.
    #[serde(default)]
    pub public: Table,

    /// Overrides supplied by the host or the caller.
    #[serde(default)]
    pub custom: Table,
}

impl ConfigTables {
    /// Create config tables where the effective configuration starts out
    /// as the defaults.
    pub fn with_defaults(default: Table) -> Self {
        Self {
            public: default.clone(),
            default,
            custom: Table::new(),
        }
    }

    /// Apply an override on top of the effective configuration.
    pub fn apply_override(&mut self, overrides: Table) {
        merge_tables(&mut self.custom, overrides.clone(), MergePolicy::PreferIncoming);
        merge_tables(&mut self.public, overrides, MergePolicy::PreferIncoming);
    }

    fn is_empty(&self) -> bool {
        self.default.is_empty() && self.public.is_empty() && self.custom.is_empty()
    }
}

/// The three capability tables of a component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentTables {
    /// State only the component itself touches.
    #[serde(default)]
    pub private: Table,

    /// API exposed to dependents.
    #[serde(default)]
    pub public: Table,

    /// Configuration.
    #[serde(default)]
    pub config: ConfigTables,
}

impl ComponentTables {
    /// Check if every table is empty.
    pub fn is_empty(&self) -> bool {
        self.private.is_empty() && self.public.is_empty() && self.config.is_empty()
    }

    /// Deep-merge another set of tables into these.
    pub fn merge_from(&mut self, other: ComponentTables, policy: MergePolicy) {
        merge_tables(&mut self.private, other.private, policy);
        merge_tables(&mut self.public, other.public, policy);
        merge_tables(&mut self.config.default, other.config.default, policy);
        merge_tables(&mut self.config.public, other.config.public, policy);
        merge_tables(&mut self.config.custom, other.config.custom, policy);
    }

    /// Copy the non-empty tables of `base` into these as defaults.
    ///
    /// Entries already present here are kept; `base` only fills gaps.
    pub fn inherit_from(&mut self, base: &ComponentTables) {
        let pairs = [
            (&mut self.private, &base.private),
            (&mut self.public, &base.public),
            (&mut self.config.default, &base.config.default),
            (&mut self.config.public, &base.config.public),
            (&mut self.config.custom, &base.config.custom),
        ];
        for (target, source) in pairs {
            if !source.is_empty() {
                merge_tables(target, source.clone(), MergePolicy::KeepExisting);
            }
        }
    }
}

/// Event subscriptions, keyed by source component.
///
/// A kind of `"*"` subscribes to every event of that source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subscriptions(IndexMap<String, IndexSet<String>>);

impl Subscriptions {
    /// Subscribe to an event kind of a source component.
    pub fn subscribe(&mut self, source: impl Into<String>, kind: impl Into<String>) {
        self.0.entry(source.into()).or_default().insert(kind.into());
    }

    /// Check if an event matches any subscription.
    pub fn matches(&self, event: &Event) -> bool {
        self.0
            .get(&event.source)
            .is_some_and(|kinds| kinds.contains(&event.kind) || kinds.contains("*"))
    }

    /// Check if there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(source, kind)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(|(source, kinds)| {
            kinds.iter().map(move |kind| (source.as_str(), kind.as_str()))
        })
    }
}

/// Static declaration of a named component.
#[derive(Clone)]
pub struct ComponentDescriptor {
    name: CompactString,
    tables: ComponentTables,
    subscriptions: Subscriptions,
    setup: SetupFn,
    on_load: Option<LoadFn>,
    on_event: Option<EventFn>,
}

impl ComponentDescriptor {
    /// Start building a descriptor.
    pub fn builder(name: impl Into<CompactString>) -> DescriptorBuilder {
        DescriptorBuilder::new(name)
    }

    /// Dot-segmented component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default capability tables.
    pub fn tables(&self) -> &ComponentTables {
        &self.tables
    }

    /// Event subscriptions.
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Run the setup hook.
    pub fn setup(&self) -> Option<SetupResult> {
        (self.setup)()
    }

    /// Late initialization hook, if any.
    pub fn on_load(&self) -> Option<&LoadFn> {
        self.on_load.as_ref()
    }

    /// Event hook, if any.
    pub fn on_event(&self) -> Option<&EventFn> {
        self.on_event.as_ref()
    }

    /// Return a copy of this descriptor with `overrides` applied on top of
    /// its public configuration.
    pub fn configured(mut self, overrides: Table) -> Self {
        if !overrides.is_empty() {
            self.tables.config.apply_override(overrides);
        }
        self
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("tables", &self.tables)
            .field("subscriptions", &self.subscriptions)
            .field("on_load", &self.on_load.is_some())
            .field("on_event", &self.on_event.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ComponentDescriptor`].
///
/// Unless a custom hook is given with [`setup`](Self::setup), the built
/// descriptor's setup succeeds and reports the dependencies declared here.
pub struct DescriptorBuilder {
    name: CompactString,
    declared: SetupResult,
    tables: ComponentTables,
    subscriptions: Subscriptions,
    setup: Option<SetupFn>,
    on_load: Option<LoadFn>,
    on_event: Option<EventFn>,
}

impl DescriptorBuilder {
    /// Create a builder for the named component.
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            declared: SetupResult::ok(),
            tables: ComponentTables::default(),
            subscriptions: Subscriptions::default(),
            setup: None,
            on_load: None,
            on_event: None,
        }
    }

    /// Add a hard dependency.
    pub fn requires(mut self, name: impl Into<String>) -> Self {
        self.declared.requires.insert(name.into());
        self
    }

    /// Add a soft dependency.
    pub fn wants(mut self, name: impl Into<String>) -> Self {
        self.declared.wants.insert(name.into());
        self
    }

    /// Add an import.
    pub fn imports(mut self, name: impl Into<String>) -> Self {
        self.declared.imports.push(name.into());
        self
    }

    /// Declare the component this one replaces.
    pub fn replaces(mut self, target: impl Into<String>) -> Self {
        self.declared.replaces = Some(target.into());
        self
    }

    /// Merge the replaced component's tables into this one.
    pub fn replace_merge(mut self, merge: bool) -> Self {
        self.declared.replace_merge = merge;
        self
    }

    /// Set a private state entry.
    pub fn private(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tables.private.insert(key.into(), value.into());
        self
    }

    /// Set a public API entry.
    pub fn public(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tables.public.insert(key.into(), value.into());
        self
    }

    /// Set the version advertised in the public table.
    pub fn version(self, version: impl Into<String>) -> Self {
        self.public("version", version.into())
    }

    /// Set a default configuration entry.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        self.tables.config.default.insert(key.clone(), value.clone());
        self.tables.config.public.insert(key, value);
        self
    }

    /// Replace all default tables.
    pub fn tables(mut self, tables: ComponentTables) -> Self {
        self.tables = tables;
        self
    }

    /// Use the non-empty tables of `base` as defaults for this component.
    pub fn inherit(mut self, base: &ComponentTables) -> Self {
        self.tables.inherit_from(base);
        self
    }

    /// Subscribe to an event.
    pub fn subscribe(mut self, source: impl Into<String>, kind: impl Into<String>) -> Self {
        self.subscriptions.subscribe(source, kind);
        self
    }

    /// Use a custom setup hook instead of the declared dependencies.
    pub fn setup(mut self, hook: impl Fn() -> Option<SetupResult> + 'static) -> Self {
        self.setup = Some(Rc::new(hook));
        self
    }

    /// Set the late initialization hook.
    pub fn on_load(mut self, hook: impl Fn(&mut ComponentContext<'_>) + 'static) -> Self {
        self.on_load = Some(Rc::new(hook));
        self
    }

    /// Set the event hook.
    pub fn on_event(
        mut self,
        hook: impl Fn(&Event, &mut ComponentContext<'_>) + 'static,
    ) -> Self {
        self.on_event = Some(Rc::new(hook));
        self
    }

    /// Build the descriptor.
    pub fn build(self) -> ComponentDescriptor {
        let setup = self.setup.unwrap_or_else(|| {
            let declared = self.declared;
            Rc::new(move || Some(declared.clone()))
        });

        ComponentDescriptor {
            name: self.name,
            tables: self.tables,
            subscriptions: self.subscriptions,
            setup,
            on_load: self.on_load,
            on_event: self.on_event,
        }
    }
}
