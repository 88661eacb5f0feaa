//! Descriptor lookup.
//!
//! The registry does not know where descriptors come from. It asks a
//! [`DescriptorSource`] for a descriptor by name whenever it needs to load
//! something it has not seen yet.

use indexmap::IndexMap;
use itertools::Itertools;
use modhost_core::ComponentDescriptor;

/// Something that can produce component descriptors by name.
pub trait DescriptorSource {
    /// Look up the descriptor for `name`.
    fn lookup(&self, name: &str) -> Option<ComponentDescriptor>;

    /// Names of every descriptor this source can produce.
    fn names(&self) -> Vec<String>;

    /// Check if this source knows `name`.
    fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

/// An in-memory set of descriptors.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    descriptors: IndexMap<String, ComponentDescriptor>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any previous one with the same name.
    pub fn register(&mut self, descriptor: ComponentDescriptor) -> &mut Self {
        self.descriptors
            .insert(descriptor.name().to_string(), descriptor);
        self
    }

    /// Add a descriptor (builder style).
    pub fn with(mut self, descriptor: ComponentDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl FromIterator<ComponentDescriptor> for Catalog {
    fn from_iter<I: IntoIterator<Item = ComponentDescriptor>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for descriptor in iter {
            catalog.register(descriptor);
        }
        catalog
    }
}

impl DescriptorSource for Catalog {
    fn lookup(&self, name: &str) -> Option<ComponentDescriptor> {
        self.descriptors.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.descriptors.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }
}

/// Several sources queried in order; the first hit wins.
#[derive(Default)]
pub struct Chain {
    sources: Vec<Box<dyn DescriptorSource>>,
}

impl Chain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with lower priority than the existing ones.
    pub fn then(mut self, source: impl DescriptorSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl DescriptorSource for Chain {
    fn lookup(&self, name: &str) -> Option<ComponentDescriptor> {
        self.sources.iter().find_map(|source| source.lookup(name))
    }

    fn names(&self) -> Vec<String> {
        self.sources
            .iter()
            .flat_map(|source| source.names())
            .unique()
            .collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.sources.iter().any(|source| source.contains(name))
    }
}
