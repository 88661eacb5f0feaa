//! The component registry.

use std::collections::HashMap;

use modhost_core::{
    CapabilityRef, ComponentDescriptor, DescriptorBuilder, Event, LifecycleEvent, LoadedComponent,
    MergePolicy, Table, Version, merge_tables,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::broadcast::{Broadcaster, LoadedMap, SubscriptionId};
use crate::catalog::DescriptorSource;
use crate::config::HostConfig;
use crate::error::{RegistryError, RegistryResult};

/// Outcome of a successful load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The component was instantiated by this call.
    Loaded,
    /// The name was already occupied; nothing ran.
    AlreadyLoaded,
}

impl LoadStatus {
    /// Check if this call instantiated the component.
    pub fn is_newly_loaded(self) -> bool {
        matches!(self, Self::Loaded)
    }
}

/// Owns every loaded component and drives their lifecycle.
///
/// Components are keyed by the name they were declared with. A component
/// that replaced another one stays under its own key; the replaced name
/// becomes an alias of it, so lookups by either name reach the same
/// instance.
pub struct Registry {
    pub(crate) source: Box<dyn DescriptorSource>,
    pub(crate) host: HostConfig,
    pub(crate) loaded: LoadedMap,
    pub(crate) aliases: HashMap<String, String>,
    pub(crate) resolving: Vec<String>,
    pub(crate) loaded_count: usize,
    pub(crate) broadcaster: Broadcaster,
}

impl Registry {
    /// Create an empty registry that looks descriptors up in `source`.
    pub fn new(source: impl DescriptorSource + 'static, host: HostConfig) -> Self {
        Self {
            source: Box::new(source),
            host,
            loaded: LoadedMap::new(),
            aliases: HashMap::new(),
            resolving: Vec::new(),
            loaded_count: 0,
            broadcaster: Broadcaster::new(),
        }
    }

    /// The host configuration.
    pub fn host(&self) -> &HostConfig {
        &self.host
    }

    /// The descriptor source.
    pub fn source(&self) -> &dyn DescriptorSource {
        self.source.as_ref()
    }

    /// Load a component by name.
    ///
    /// Loading an occupied name is a no-op that returns
    /// [`LoadStatus::AlreadyLoaded`].
    pub fn load(&mut self, name: &str) -> RegistryResult<LoadStatus> {
        self.load_with(name, None, None)
    }

    /// Load a component by name, recording `parent` as the component that
    /// asked for it and merging `config` over its host configuration.
    pub fn load_with(
        &mut self,
        name: &str,
        parent: Option<&str>,
        config: Option<Table>,
    ) -> RegistryResult<LoadStatus> {
        if self.resolves(name) {
            debug!(target: "modhost", component = %name, "already loaded");
            return Ok(LoadStatus::AlreadyLoaded);
        }

        let Some(descriptor) = self.source.lookup(name) else {
            warn!(target: "modhost", component = %name, parent = ?parent, "no descriptor found");
            return Err(RegistryError::MissingDescriptor {
                name: name.to_string(),
            });
        };

        let descriptor = self.configure(descriptor, config);
        self.load_from_descriptor(descriptor, parent)
    }

    /// Apply host overrides, then caller overrides, to a descriptor's config.
    fn configure(&self, descriptor: ComponentDescriptor, config: Option<Table>) -> ComponentDescriptor {
        let mut overrides = self
            .host
            .config_for(descriptor.name())
            .cloned()
            .unwrap_or_default();
        if let Some(config) = config {
            merge_tables(&mut overrides, config, MergePolicy::PreferIncoming);
        }

        if overrides.is_empty() {
            descriptor
        } else {
            descriptor.configured(overrides)
        }
    }

    /// Check if a component is loaded under exactly this registry key.
    ///
    /// A replaced name is not loaded: its slot belongs to the replacement,
    /// which is reachable through [`get`](Self::get).
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    /// Look up a component by registry key or by the name it replaced.
    pub fn get(&self, name: &str) -> Option<&LoadedComponent> {
        self.slot_key(name).and_then(|key| self.loaded.get(key))
    }

    /// Public API of a loaded component.
    pub fn get_public_api(&self, name: &str) -> Option<&Table> {
        self.get(name).map(LoadedComponent::public_api)
    }

    /// Public API of a loaded component, deserialized into `T`.
    pub fn get_public_api_as<T: DeserializeOwned>(&self, name: &str) -> RegistryResult<T> {
        let component = self.get(name).ok_or_else(|| RegistryError::NotLoaded {
            name: name.to_string(),
        })?;
        component
            .capability()
            .to_typed()
            .map_err(|source| RegistryError::Conversion {
                name: name.to_string(),
                source,
            })
    }

    /// Effective configuration of a loaded component.
    pub fn get_config(&self, name: &str) -> Option<&Table> {
        self.get(name).map(|component| &component.config().public)
    }

    /// Version advertised in a component's public API under `version`.
    pub fn get_version(&self, name: &str) -> Option<Version> {
        let component = self.get(name)?;
        let Some(raw) = component.public_api().get("version") else {
            debug!(target: "modhost", component = %name, "no version advertised");
            return None;
        };

        let version = raw.as_str().and_then(Version::parse);
        if version.is_none() {
            debug!(target: "modhost", component = %name, version = %raw, "unparseable version");
        }
        version
    }

    /// Registry keys of every loaded component, in load order.
    pub fn loaded_names(&self) -> impl Iterator<Item = &str> {
        self.loaded.keys().map(String::as_str)
    }

    /// Every loaded component, in load order.
    pub fn components(&self) -> impl Iterator<Item = &LoadedComponent> {
        self.loaded.values()
    }

    /// Number of successful loads since the registry was created.
    pub fn loaded_count(&self) -> usize {
        self.loaded_count
    }

    /// Registry key answering to `name`, following replacement aliases.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.slot_key(name)
    }

    /// Run `callback` with a component's public API once it is loaded.
    ///
    /// If the component is already loaded the callback runs immediately and
    /// `true` is returned. Otherwise it runs exactly once, right after the
    /// component finishes loading.
    pub fn await_component(
        &mut self,
        name: &str,
        callback: impl FnOnce(CapabilityRef) + 'static,
    ) -> bool {
        if let Some(component) = self.get(name) {
            callback(component.capability());
            return true;
        }

        debug!(target: "modhost", component = %name, "deferring callback until load");
        let target = name.to_string();
        self.broadcaster.subscribe_once(
            move |event| event.announces(&target),
            move |event, loaded| {
                if let Some(component) = announced(event, loaded) {
                    callback(component.capability());
                }
            },
        );
        false
    }

    /// Subscribe to every lifecycle event.
    pub fn on_lifecycle(
        &mut self,
        callback: impl FnMut(&LifecycleEvent, &LoadedMap) + 'static,
    ) -> SubscriptionId {
        self.broadcaster.subscribe(|_| true, callback)
    }

    /// Run `callback` after every successful load with the component.
    pub fn on_loaded(&mut self, mut callback: impl FnMut(&LoadedComponent) + 'static) -> SubscriptionId {
        self.broadcaster.subscribe(
            |event| matches!(event, LifecycleEvent::ComponentLoaded { .. }),
            move |event, loaded| {
                if let Some(component) = announced(event, loaded) {
                    callback(component);
                }
            },
        )
    }

    /// Remove a lifecycle subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    /// Deliver a user event to every subscribed component.
    ///
    /// Returns the number of components whose event hook ran.
    pub fn broadcast(&mut self, event: &Event) -> usize {
        let keys: Vec<String> = self.loaded.keys().cloned().collect();
        let delivered = keys
            .iter()
            .filter(|key| self.deliver_event(key, event))
            .count();

        debug!(target: "modhost", event = %event.event_type(), delivered, "broadcast event");
        delivered
    }

    /// Deliver a user event to one component.
    ///
    /// Returns whether its event hook ran.
    pub fn send(&mut self, target: &str, event: &Event) -> RegistryResult<bool> {
        let key = self
            .slot_key(target)
            .map(str::to_string)
            .ok_or_else(|| RegistryError::NotLoaded {
                name: target.to_string(),
            })?;

        Ok(self.deliver_event(&key, event))
    }

    /// Start a descriptor that inherits the tables of a loaded component.
    ///
    /// Tables the new descriptor declares itself take precedence. If
    /// `parent` is not loaded the builder starts empty.
    pub fn extend(&self, name: &str, parent: &str) -> DescriptorBuilder {
        let builder = ComponentDescriptor::builder(name);
        match self.get(parent) {
            Some(base) => builder.inherit(base.tables()),
            None => {
                warn!(target: "modhost", component = %name, parent = %parent, "parent not loaded, nothing to inherit");
                builder
            }
        }
    }

    /// Announce shutdown and drop every component and subscription.
    pub fn shutdown(&mut self) {
        self.broadcaster
            .emit(&LifecycleEvent::RegistryShutdown, &self.loaded);

        info!(target: "modhost", components = self.loaded.len(), "registry shut down");
        self.loaded.clear();
        self.aliases.clear();
        self.resolving.clear();
        self.broadcaster.clear();
    }

    /// Check if `name` is occupied, directly or through an alias.
    pub(crate) fn resolves(&self, name: &str) -> bool {
        self.slot_key(name).is_some()
    }

    pub(crate) fn slot_key<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.loaded.contains_key(name) {
            return Some(name);
        }
        self.aliases
            .get(name)
            .map(String::as_str)
            .filter(|key| self.loaded.contains_key(*key))
    }
}

/// The component a load event is about.
fn announced<'a>(event: &LifecycleEvent, loaded: &'a LoadedMap) -> Option<&'a LoadedComponent> {
    match event {
        LifecycleEvent::ComponentLoaded { name, .. } => loaded.get(name),
        LifecycleEvent::RegistryShutdown => None,
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("loaded", &self.loaded.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases)
            .field("loaded_count", &self.loaded_count)
            .field("broadcaster", &self.broadcaster)
            .finish()
    }
}
