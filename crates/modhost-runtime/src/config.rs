//! Host configuration.
//!
//! The host decides which soft dependencies may be loaded and which
//! configuration overrides each component receives:
//!
//! ```toml
//! [load."core.base"]
//!
//! [load."core.ui"]
//! config = { theme = "dark" }
//!
//! [load."core.debug"]
//! enabled = false
//! ```

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use indexmap::IndexMap;
use modhost_core::Table;
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// Host settings for one component.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
pub struct HostEntry {
    /// Whether the host enables the component.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Configuration overrides merged into the component's public config.
    #[serde(default)]
    pub config: Table,
}

fn default_true() -> bool {
    true
}

impl Default for HostEntry {
    fn default() -> Self {
        Self {
            enabled: true,
            config: Table::new(),
        }
    }
}

impl HostEntry {
    /// Create a new host entry builder.
    pub fn builder() -> HostEntryBuilder {
        HostEntryBuilder::default()
    }

    /// An enabled entry carrying `config`.
    pub fn with_config(config: Table) -> Self {
        Self {
            enabled: true,
            config,
        }
    }
}

/// Host configuration surface consulted while resolving components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Components listed by the host, keyed by name.
    #[serde(default)]
    pub load: IndexMap<String, HostEntry>,
}

impl HostConfig {
    /// Default location of the host configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("modhost")
            .join("host.toml")
    }

    /// Parse a host configuration from TOML.
    pub fn from_toml_str(content: &str) -> RegistryResult<Self> {
        toml::from_str(content).map_err(|e| RegistryError::Config {
            message: e.to_string(),
        })
    }

    /// Read a host configuration file.
    pub fn load_from(path: &Path) -> RegistryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Read the configuration at [`default_path`](Self::default_path), or
    /// return an empty configuration if there is none.
    pub fn discover() -> RegistryResult<Self> {
        let path = Self::default_path();
        if !path.exists() {
            tracing::debug!(target: "modhost", path = %path.display(), "no host configuration found");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Enable a component with no configuration overrides.
    pub fn enable(self, name: impl Into<String>) -> Self {
        self.with_entry(name, HostEntry::default())
    }

    /// Disable a component.
    pub fn disable(mut self, name: impl Into<String>) -> Self {
        self.load.entry(name.into()).or_default().enabled = false;
        self
    }

    /// Set the entry for a component.
    pub fn with_entry(mut self, name: impl Into<String>, entry: HostEntry) -> Self {
        self.load.insert(name.into(), entry);
        self
    }

    /// Check if the host explicitly enabled a component.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.load.get(name).is_some_and(|entry| entry.enabled)
    }

    /// Configuration overrides for a component, if any.
    pub fn config_for(&self, name: &str) -> Option<&Table> {
        self.load
            .get(name)
            .map(|entry| &entry.config)
            .filter(|config| !config.is_empty())
    }

    /// Names of every enabled component, in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.load
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(name, _)| name.as_str())
    }
}
