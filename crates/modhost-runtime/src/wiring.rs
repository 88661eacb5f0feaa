//! Capability wiring and import folding.

use modhost_core::{Event, LoadedComponent, MergePolicy, SetupResult};
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::Registry;

impl Registry {
    /// Point each of the component's `required` entries at the public API
    /// of the dependency it names, wants first.
    pub(crate) fn wire_dependencies(&mut self, name: &str, setup: &SetupResult) -> RegistryResult<()> {
        for dependency in setup.dependencies() {
            let capability = self
                .get(dependency)
                .map(LoadedComponent::capability)
                .ok_or_else(|| RegistryError::NotLoaded {
                    name: dependency.to_string(),
                })?;
            self.tentative(name)?.wire(dependency, capability);
        }
        Ok(())
    }

    /// Load each `<name>.<import>` sub-component and fold its tables into
    /// the component. Values the component already has are kept.
    pub(crate) fn fold_imports(&mut self, name: &str, setup: &SetupResult) -> RegistryResult<()> {
        let origin = self.tentative(name)?.origin().to_string();

        for import in &setup.imports {
            let full = format!("{origin}.{import}");
            self.ensure_cycle_free(&full)?;

            if !self.resolves(&full) && !self.source.contains(&full) {
                warn!(target: "modhost", component = %name, import = %full, "import not found");
                return Err(RegistryError::ImportNotFound {
                    component: name.to_string(),
                    import: full,
                });
            }
            self.load_dependency(name, &full)?;

            let tables = self
                .get(&full)
                .map(|imported| imported.tables().clone())
                .ok_or_else(|| RegistryError::NotLoaded { name: full.clone() })?;

            let component = self.tentative(name)?;
            component.tables_mut().merge_from(tables, MergePolicy::KeepExisting);
            component.record_import(full.as_str());
            debug!(target: "modhost", component = %name, import = %full, "folded import");
        }
        Ok(())
    }

    /// Re-wire every component that requires `key`, under its own name or
    /// an alias, to its current public API. Returns how many entries changed.
    pub(crate) fn refresh_dependents(&mut self, key: &str) -> usize {
        let Some(capability) = self.loaded.get(key).map(LoadedComponent::capability) else {
            return 0;
        };
        let names: Vec<String> = self
            .aliases
            .iter()
            .filter(|(_, slot)| slot.as_str() == key)
            .map(|(alias, _)| alias.clone())
            .chain(std::iter::once(key.to_string()))
            .collect();

        let mut rewired = 0;
        for (dependent, component) in self.loaded.iter_mut() {
            if dependent == key {
                continue;
            }
            let stale: Vec<String> = component
                .required()
                .keys()
                .filter(|dependency| names.contains(dependency))
                .cloned()
                .collect();
            for dependency in stale {
                component.wire(dependency, capability.clone());
                rewired += 1;
            }
        }
        if rewired > 0 {
            debug!(target: "modhost", component = %key, rewired, "refreshed dependents");
        }
        rewired
    }

    /// Deliver `event` to the component under `key`. A public API changed
    /// by the hook is pushed to its dependents.
    pub(crate) fn deliver_event(&mut self, key: &str, event: &Event) -> bool {
        let Some(component) = self.loaded.get_mut(key) else {
            return false;
        };
        if !component.descriptor().subscriptions().matches(event) {
            return false;
        }

        let before = component.public_api().clone();
        let ran = component.deliver(event);
        if ran && *component.public_api() != before {
            self.refresh_dependents(key);
        }
        ran
    }

    /// The entry inserted for a component that is still resolving.
    pub(crate) fn tentative(&mut self, name: &str) -> RegistryResult<&mut LoadedComponent> {
        self.loaded
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotLoaded {
                name: name.to_string(),
            })
    }
}
