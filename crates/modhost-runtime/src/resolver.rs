//! The load algorithm.
//!
//! A component is inserted into the registry as soon as its setup succeeds,
//! before any of its dependencies are resolved. That tentative entry is what
//! makes a second request for the same name during resolution a no-op, and
//! the `resolving` stack is what tells such a request apart from a true
//! cycle. If anything after setup fails, the entry is removed again;
//! dependencies that finished loading stay loaded.

use modhost_core::{ComponentDescriptor, LifecycleEvent, LoadedComponent, SetupResult};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::hotswap::Replacement;
use crate::registry::{LoadStatus, Registry};

impl Registry {
    /// Load a component from a descriptor the caller already holds.
    ///
    /// The descriptor is used as-is: host configuration overrides are only
    /// applied when loading by name.
    pub fn load_from_descriptor(
        &mut self,
        descriptor: ComponentDescriptor,
        parent: Option<&str>,
    ) -> RegistryResult<LoadStatus> {
        let name = descriptor.name().to_string();
        self.ensure_cycle_free(&name)?;
        if self.resolves(&name) {
            debug!(target: "modhost", component = %name, "already loaded");
            return Ok(LoadStatus::AlreadyLoaded);
        }

        let setup = match descriptor.setup() {
            Some(setup) if setup.success => setup,
            Some(_) => return Err(setup_failed(&name, "setup reported failure")),
            None => return Err(setup_failed(&name, "setup returned no result")),
        };
        debug!(target: "modhost", component = %name, parent = ?parent, "setup succeeded");

        self.loaded
            .insert(name.clone(), LoadedComponent::new(descriptor, setup.clone()));
        self.resolving.push(name.clone());
        let outcome = self.resolve(&name, &setup);
        self.resolving.pop();

        match outcome {
            Ok(replacement) => {
                self.commit(&name, replacement);
                Ok(LoadStatus::Loaded)
            }
            Err(err) => {
                self.loaded.shift_remove(&name);
                debug!(target: "modhost", component = %name, error = %err, "load rolled back");
                Err(err)
            }
        }
    }

    /// Everything between setup and commit that may fail.
    fn resolve(&mut self, name: &str, setup: &SetupResult) -> RegistryResult<Option<Replacement>> {
        for want in &setup.wants {
            self.ensure_cycle_free(want)?;
            if self.resolves(want) {
                continue;
            }
            if !self.host.is_enabled(want) {
                warn!(target: "modhost", component = %name, want = %want, "wanted component is not enabled");
                return Err(RegistryError::UnsatisfiedWant {
                    component: name.to_string(),
                    want: want.clone(),
                });
            }
            self.load_dependency(name, want)?;
        }

        for required in &setup.requires {
            self.ensure_cycle_free(required)?;
            self.load_dependency(name, required)?;
        }

        self.wire_dependencies(name, setup)?;
        let replacement = self.prepare_replacement(name, setup)?;
        self.fold_imports(name, setup)?;

        Ok(replacement)
    }

    /// Load `dependency` on behalf of `component`.
    pub(crate) fn load_dependency(&mut self, component: &str, dependency: &str) -> RegistryResult<()> {
        self.load_with(dependency, Some(component), None)
            .map(|_| ())
            .map_err(|err| err.in_dependency(component, dependency))
    }

    /// Fail if `name` is still being resolved further up the stack.
    pub(crate) fn ensure_cycle_free(&self, name: &str) -> RegistryResult<()> {
        let key = self.slot_key(name).unwrap_or(name);
        let Some(start) = self.resolving.iter().position(|entry| entry == key) else {
            return Ok(());
        };

        let mut path = self.resolving[start..].to_vec();
        path.push(key.to_string());
        warn!(target: "modhost", cycle = %path.join(" -> "), "dependency cycle");
        Err(RegistryError::CycleDetected { path })
    }

    /// Make a fully resolved component visible.
    fn commit(&mut self, name: &str, replacement: Option<Replacement>) {
        if let Some(replacement) = replacement {
            self.commit_replacement(name, replacement);
        }

        // Dependencies were inserted after the tentative entry; move it
        // behind them so iteration follows completion order.
        if let Some(index) = self.loaded.get_index_of(name) {
            let last = self.loaded.len() - 1;
            self.loaded.move_index(index, last);
        }

        let Some(component) = self.loaded.get_mut(name) else {
            return;
        };
        component.run_load_hook();
        let slot = component.name().to_string();
        let dependencies = component.required().len();
        let imports = component.imported().len();

        let rewired = self.refresh_dependents(name);
        self.loaded_count += 1;

        info!(
            target: "modhost",
            component = %name,
            slot = %slot,
            dependencies,
            imports,
            rewired,
            "component loaded"
        );
        let event = LifecycleEvent::ComponentLoaded {
            name: name.to_string(),
            slot,
        };
        self.broadcaster.emit(&event, &self.loaded);
    }
}

fn setup_failed(name: &str, reason: &str) -> RegistryError {
    warn!(target: "modhost", component = %name, reason, "setup failed");
    RegistryError::SetupFailed {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use modhost_core::ComponentDescriptor;

    use super::*;
    use crate::catalog::Catalog;
    use crate::config::HostConfig;
    use crate::error::ErrorKind;

    #[test]
    fn test_completion_order() {
        let catalog = Catalog::new()
            .with(ComponentDescriptor::builder("core.top").requires("core.mid").build())
            .with(ComponentDescriptor::builder("core.mid").requires("core.base").build())
            .with(ComponentDescriptor::builder("core.base").build());
        let mut registry = Registry::new(catalog, HostConfig::default());

        registry.load("core.top").unwrap();
        let order: Vec<&str> = registry.loaded_names().collect();
        assert_eq!(order, vec!["core.base", "core.mid", "core.top"]);
    }

    #[test]
    fn test_cycle_path() {
        let catalog = Catalog::new()
            .with(ComponentDescriptor::builder("a").requires("b").build())
            .with(ComponentDescriptor::builder("b").requires("a").build());
        let mut registry = Registry::new(catalog, HostConfig::default());

        let err = registry.load("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CycleDetected);
        match err {
            RegistryError::CycleDetected { path } => assert_eq!(path, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.loaded_names().count(), 0);
        assert!(registry.resolving.is_empty());
    }

    #[test]
    fn test_setup_without_result() {
        let catalog = Catalog::new().with(ComponentDescriptor::builder("core.void").setup(|| None).build());
        let mut registry = Registry::new(catalog, HostConfig::default());

        let err = registry.load("core.void").unwrap_err();
        assert!(matches!(err, RegistryError::SetupFailed { .. }));
        assert_eq!(registry.loaded_count(), 0);
    }

    #[test]
    fn test_descriptor_for_replaced_name_is_a_no_op() {
        let catalog = Catalog::new()
            .with(ComponentDescriptor::builder("x").public("v", 1).build())
            .with(ComponentDescriptor::builder("y").replaces("x").public("v", 2).build());
        let mut registry = Registry::new(catalog, HostConfig::default());
        registry.load("x").unwrap();
        registry.load("y").unwrap();

        let again = ComponentDescriptor::builder("x").public("v", 1).build();
        let status = registry.load_from_descriptor(again, None).unwrap();

        assert_eq!(status, LoadStatus::AlreadyLoaded);
        assert_eq!(registry.loaded_names().collect::<Vec<_>>(), vec!["y"]);
        assert_eq!(registry.loaded_count(), 2);
        assert_eq!(
            registry.get_public_api("x").and_then(|api| api.get("v")),
            Some(&modhost_core::Value::from(2))
        );
    }
}
