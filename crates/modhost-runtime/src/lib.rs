//! Component lifecycle runtime for modhost.
//!
//! The [`Registry`] loads named components on demand. Loading a component
//! resolves its hard dependencies (`requires`) and host-enabled soft
//! dependencies (`wants`), wires their public APIs into the component,
//! applies any pending hotswap of an already-loaded component, folds in
//! imported sub-components and finally announces the load to listeners.
//!
//! # Example
//!
//! ```
//! use modhost_core::ComponentDescriptor;
//! use modhost_runtime::{Catalog, HostConfig, Registry};
//!
//! let mut catalog = Catalog::new();
//! catalog.register(ComponentDescriptor::builder("core.base").public("width", 80).build());
//! catalog.register(ComponentDescriptor::builder("core.ui").requires("core.base").build());
//!
//! let mut registry = Registry::new(catalog, HostConfig::default());
//! registry.load("core.ui").unwrap();
//!
//! assert!(registry.is_loaded("core.base"));
//! assert_eq!(registry.loaded_count(), 2);
//! ```

mod broadcast;
mod catalog;
mod config;
mod error;
mod hotswap;
mod manifest;
mod registry;
mod resolver;
mod wiring;

pub use broadcast::{Broadcaster, LoadedMap, SubscriptionId};
pub use catalog::{Catalog, Chain, DescriptorSource};
pub use config::{HostConfig, HostEntry, HostEntryBuilder};
pub use error::{ErrorKind, RegistryError, RegistryResult};
pub use manifest::{ComponentManifest, ManifestCatalog, ManifestSubscription};
pub use registry::{LoadStatus, Registry};
