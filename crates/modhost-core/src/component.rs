//! Loaded component instances.

use std::ops::Deref;
use std::rc::Rc;

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::descriptor::{ComponentDescriptor, ComponentTables, ConfigTables, SetupResult};
use crate::error::ValueError;
use crate::event::Event;
use crate::value::{Table, Value};

/// A read-only handle to a dependency's public API.
///
/// Handles are snapshots taken when the dependency is wired; they cannot be
/// used to mutate the dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityRef(Rc<Table>);

impl CapabilityRef {
    /// Wrap a public table.
    pub fn new(table: Table) -> Self {
        Self(Rc::new(table))
    }

    /// The underlying table.
    pub fn table(&self) -> &Table {
        &self.0
    }

    /// Convert the API into a typed structure.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        Value::Object(self.table().clone()).to_typed()
    }

    /// Check if two handles share the same snapshot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for CapabilityRef {
    type Target = Table;

    fn deref(&self) -> &Table {
        &self.0
    }
}

/// What a component's hooks get to see of itself.
///
/// Hooks can mutate their own tables but only read their dependencies.
pub struct ComponentContext<'a> {
    name: &'a str,
    tables: &'a mut ComponentTables,
    required: &'a IndexMap<String, CapabilityRef>,
}

impl ComponentContext<'_> {
    /// Name the component answers to.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Own capability tables.
    pub fn tables(&self) -> &ComponentTables {
        self.tables
    }

    /// Own private state.
    pub fn private_mut(&mut self) -> &mut Table {
        &mut self.tables.private
    }

    /// Own public API.
    pub fn public_mut(&mut self) -> &mut Table {
        &mut self.tables.public
    }

    /// Effective configuration.
    pub fn config(&self) -> &Table {
        &self.tables.config.public
    }

    /// Public API of a wired dependency.
    pub fn required(&self, name: &str) -> Option<&CapabilityRef> {
        self.required.get(name)
    }
}

/// A component that passed setup and lives in the registry.
#[derive(Debug, Clone)]
pub struct LoadedComponent {
    name: CompactString,
    origin: CompactString,
    tables: ComponentTables,
    required: IndexMap<String, CapabilityRef>,
    imported: Vec<String>,
    setup: SetupResult,
    replaced: bool,
    descriptor: ComponentDescriptor,
}

impl LoadedComponent {
    /// Instantiate a descriptor whose setup returned `setup`.
    pub fn new(descriptor: ComponentDescriptor, setup: SetupResult) -> Self {
        let name = CompactString::from(descriptor.name());
        Self {
            origin: name.clone(),
            name,
            tables: descriptor.tables().clone(),
            required: IndexMap::new(),
            imported: Vec::new(),
            setup,
            replaced: false,
            descriptor,
        }
    }

    /// Name the component answers to. After a replacement this is the
    /// replaced component's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name the component was declared with.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// All capability tables.
    pub fn tables(&self) -> &ComponentTables {
        &self.tables
    }

    /// Private state.
    pub fn private_state(&self) -> &Table {
        &self.tables.private
    }

    /// Public API.
    pub fn public_api(&self) -> &Table {
        &self.tables.public
    }

    /// Configuration tables.
    pub fn config(&self) -> &ConfigTables {
        &self.tables.config
    }

    /// Wired dependencies, keyed by the name they were declared under.
    pub fn required(&self) -> &IndexMap<String, CapabilityRef> {
        &self.required
    }

    /// Public API of one wired dependency.
    pub fn required_api(&self, name: &str) -> Option<&CapabilityRef> {
        self.required.get(name)
    }

    /// Full names of imported sub-components, in import order.
    pub fn imported(&self) -> &[String] {
        &self.imported
    }

    /// The setup result the component was loaded with.
    pub fn setup(&self) -> &SetupResult {
        &self.setup
    }

    /// Whether this instance has taken the place of another component.
    pub fn is_replaced(&self) -> bool {
        self.replaced
    }

    /// The descriptor this instance was created from.
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    /// Snapshot of the public API for wiring into dependents.
    pub fn capability(&self) -> CapabilityRef {
        CapabilityRef::new(self.tables.public.clone())
    }

    // The methods below are called by the registry while it owns the
    // instance; dependents only ever see `&LoadedComponent`.

    /// Mutable access to the capability tables.
    pub fn tables_mut(&mut self) -> &mut ComponentTables {
        &mut self.tables
    }

    /// Wire a dependency's public API.
    pub fn wire(&mut self, dependency: impl Into<String>, capability: CapabilityRef) {
        self.required.insert(dependency.into(), capability);
    }

    /// Answer to another component's name.
    pub fn occupy(&mut self, slot: &str) {
        self.name = CompactString::from(slot);
    }

    /// Mark this instance as a replacement. Returns `false` if it already was.
    pub fn mark_replaced(&mut self) -> bool {
        !std::mem::replace(&mut self.replaced, true)
    }

    /// Record an imported sub-component.
    pub fn record_import(&mut self, name: impl Into<String>) {
        self.imported.push(name.into());
    }

    /// Run the descriptor's late initialization hook.
    pub fn run_load_hook(&mut self) {
        if let Some(hook) = self.descriptor.on_load().cloned() {
            hook(&mut self.context());
        }
    }

    /// Deliver an event if the component subscribed to it.
    ///
    /// Returns whether the event hook ran.
    pub fn deliver(&mut self, event: &Event) -> bool {
        if !self.descriptor.subscriptions().matches(event) {
            return false;
        }
        match self.descriptor.on_event().cloned() {
            Some(hook) => {
                hook(event, &mut self.context());
                true
            }
            None => false,
        }
    }

    fn context(&mut self) -> ComponentContext<'_> {
        ComponentContext {
            name: &self.name,
            tables: &mut self.tables,
            required: &self.required,
        }
    }
}
