//! Declarative component manifests.
//!
//! A manifest directory holds one sub-directory per component, each with a
//! `component.toml`:
//!
//! ```toml
//! requires = ["core.base"]
//! wants = ["core.theme"]
//! imports = ["keys"]
//!
//! [public]
//! version = "1.2.0"
//!
//! [config]
//! width = 80
//! ```
//!
//! The component name defaults to the directory name. A `components.toml`
//! at the root of the directory may additionally declare several components
//! under `[components."name"]` tables.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use modhost_core::{ComponentDescriptor, SetupResult, Table};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, DescriptorSource};
use crate::error::{RegistryError, RegistryResult};

const COMPONENT_FILE: &str = "component.toml";
const COMPONENTS_FILE: &str = "components.toml";

/// An event subscription declared in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSubscription {
    /// Component that defines the event.
    pub source: String,

    /// Event kind, or `"*"` for every event of the source.
    #[serde(default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "*".to_string()
}

/// Declarative description of one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentManifest {
    /// Component name. Defaults to the directory or table name.
    #[serde(default)]
    pub name: Option<String>,

    /// Hard dependencies.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Soft dependencies.
    #[serde(default)]
    pub wants: Vec<String>,

    /// Sub-components to import.
    #[serde(default)]
    pub imports: Vec<String>,

    /// Component this one replaces.
    #[serde(default)]
    pub replaces: Option<String>,

    /// Merge the replaced component's tables.
    #[serde(default)]
    pub replace_merge: bool,

    /// Make setup report failure. Useful to exercise a host's error paths.
    #[serde(default)]
    pub fail_setup: bool,

    /// Initial private state.
    #[serde(default)]
    pub private: Table,

    /// Public API.
    #[serde(default)]
    pub public: Table,

    /// Default configuration.
    #[serde(default)]
    pub config: Table,

    /// Event subscriptions.
    #[serde(default)]
    pub subscribe: Vec<ManifestSubscription>,
}

impl ComponentManifest {
    /// Build a descriptor named `name` from this manifest.
    pub fn to_descriptor(&self, name: &str) -> ComponentDescriptor {
        let mut builder = ComponentDescriptor::builder(name).replace_merge(self.replace_merge);

        for required in &self.requires {
            builder = builder.requires(required.as_str());
        }
        for wanted in &self.wants {
            builder = builder.wants(wanted.as_str());
        }
        for import in &self.imports {
            builder = builder.imports(import.as_str());
        }
        if let Some(target) = &self.replaces {
            builder = builder.replaces(target.as_str());
        }
        for (key, value) in &self.private {
            builder = builder.private(key.as_str(), value.clone());
        }
        for (key, value) in &self.public {
            builder = builder.public(key.as_str(), value.clone());
        }
        for (key, value) in &self.config {
            builder = builder.config(key.as_str(), value.clone());
        }
        for subscription in &self.subscribe {
            builder = builder.subscribe(subscription.source.as_str(), subscription.kind.as_str());
        }
        if self.fail_setup {
            builder = builder.setup(|| Some(SetupResult::failed()));
        }

        builder.build()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ComponentsFile {
    #[serde(default)]
    components: IndexMap<String, ComponentManifest>,
}

/// Descriptors read from TOML manifests.
#[derive(Debug, Clone, Default)]
pub struct ManifestCatalog {
    manifests: IndexMap<String, ComponentManifest>,
    catalog: Catalog,
}

impl ManifestCatalog {
    /// Create an empty manifest catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `components.toml`-style document.
    pub fn from_toml_str(content: &str, origin: &Path) -> RegistryResult<Self> {
        let file: ComponentsFile = toml::from_str(content).map_err(|e| RegistryError::Manifest {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut catalog = Self::new();
        for (name, manifest) in file.components {
            catalog.insert(name, manifest);
        }
        Ok(catalog)
    }

    /// Read every manifest in a directory.
    pub fn from_dir(dir: &Path) -> RegistryResult<Self> {
        let mut catalog = Self::new();

        let shared = dir.join(COMPONENTS_FILE);
        if shared.is_file() {
            let content = std::fs::read_to_string(&shared)?;
            catalog.extend(Self::from_toml_str(&content, &shared)?);
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        entries.sort();

        for path in entries {
            let manifest_path = path.join(COMPONENT_FILE);
            if !manifest_path.is_file() {
                continue;
            }

            let content = std::fs::read_to_string(&manifest_path)?;
            let manifest: ComponentManifest =
                toml::from_str(&content).map_err(|e| RegistryError::Manifest {
                    path: manifest_path.clone(),
                    message: e.to_string(),
                })?;

            let name = match (&manifest.name, path.file_name().and_then(|n| n.to_str())) {
                (Some(name), _) => name.clone(),
                (None, Some(dir_name)) => dir_name.to_string(),
                (None, None) => {
                    return Err(RegistryError::Manifest {
                        path: manifest_path,
                        message: "cannot derive a component name".to_string(),
                    });
                }
            };

            tracing::debug!(target: "modhost", component = %name, path = %manifest_path.display(), "read manifest");
            catalog.insert(name, manifest);
        }

        Ok(catalog)
    }

    /// Add a manifest under `name`.
    pub fn insert(&mut self, name: impl Into<String>, manifest: ComponentManifest) {
        let name = name.into();
        let name = manifest.name.clone().unwrap_or(name);
        self.catalog.register(manifest.to_descriptor(&name));
        self.manifests.insert(name, manifest);
    }

    /// Merge another manifest catalog into this one.
    pub fn extend(&mut self, other: ManifestCatalog) {
        for (name, manifest) in other.manifests {
            self.insert(name, manifest);
        }
    }

    /// The manifest declared for a component.
    pub fn manifest(&self, name: &str) -> Option<&ComponentManifest> {
        self.manifests.get(name)
    }

    /// All manifests in declaration order.
    pub fn manifests(&self) -> impl Iterator<Item = (&str, &ComponentManifest)> {
        self.manifests.iter().map(|(name, manifest)| (name.as_str(), manifest))
    }

    /// Number of manifests.
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// Check if there are no manifests.
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

impl DescriptorSource for ManifestCatalog {
    fn lookup(&self, name: &str) -> Option<ComponentDescriptor> {
        self.catalog.lookup(name)
    }

    fn names(&self) -> Vec<String> {
        self.catalog.names()
    }

    fn contains(&self, name: &str) -> bool {
        self.catalog.contains(name)
    }
}
