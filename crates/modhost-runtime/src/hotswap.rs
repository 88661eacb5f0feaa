//! Live replacement of loaded components.
//!
//! A component whose setup declares `replaces = X` takes over X's slot. The
//! swap happens in two phases: [`Registry::prepare_replacement`] shapes the
//! incoming instance while it is still tentative, and
//! [`Registry::commit_replacement`] retires the old instance once nothing
//! else can fail. Dependents of the replaced name are re-wired when the
//! replacement commits.

use modhost_core::{MergePolicy, SetupResult};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::Registry;

/// A replacement that is ready to be committed.
#[derive(Debug)]
pub(crate) struct Replacement {
    /// Name being taken over.
    target: String,
    /// Registry key of the instance being retired, if one was loaded.
    retired: Option<String>,
}

impl Registry {
    /// Make the tentative component `name` answer to its replacement
    /// target, merging the old instance's tables if requested.
    pub(crate) fn prepare_replacement(
        &mut self,
        name: &str,
        setup: &SetupResult,
    ) -> RegistryResult<Option<Replacement>> {
        let Some(target) = setup.replaces.as_deref() else {
            return Ok(None);
        };
        // A target still resolving up the stack cannot be retired under it.
        self.ensure_cycle_free(target)?;

        let retired = self
            .slot_key(target)
            .filter(|key| *key != name)
            .map(str::to_string);
        let previous = retired
            .as_deref()
            .and_then(|key| self.loaded.get(key))
            .cloned();

        if previous.as_ref().is_some_and(|previous| previous.is_replaced()) {
            warn!(target: "modhost", component = %name, replaces = %target, "target was already replaced");
            return Err(RegistryError::DoubleReplacement {
                component: name.to_string(),
                target: target.to_string(),
            });
        }

        let component = self.tentative(name)?;
        component.occupy(target);

        match previous {
            Some(previous) if setup.replace_merge => {
                for (dependency, capability) in previous.required() {
                    if component.required_api(dependency).is_none() {
                        component.wire(dependency.as_str(), capability.clone());
                    }
                }
                component
                    .tables_mut()
                    .merge_from(previous.tables().clone(), MergePolicy::KeepExisting);
                debug!(target: "modhost", component = %name, replaces = %target, "merged replaced tables");
            }
            Some(_) => {}
            None => {
                debug!(target: "modhost", component = %name, replaces = %target, "replacement target not loaded");
            }
        }

        component.mark_replaced();

        Ok(Some(Replacement {
            target: target.to_string(),
            retired,
        }))
    }

    /// Retire the old instance and point its name and its dependents at
    /// the component `name`.
    pub(crate) fn commit_replacement(&mut self, name: &str, replacement: Replacement) {
        let Replacement { target, retired } = replacement;

        if let Some(retired) = &retired {
            self.loaded.shift_remove(retired);
            for slot in self.aliases.values_mut() {
                if *slot == *retired {
                    *slot = name.to_string();
                }
            }
        }
        self.aliases.insert(target.clone(), name.to_string());

        info!(
            target: "modhost",
            component = %name,
            replaces = %target,
            retired = ?retired,
            "component replaced"
        );
    }
}
