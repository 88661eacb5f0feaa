//! Core types for modhost.
//!
//! This crate provides the data model shared by the component runtime:
//! dynamic values, component descriptors and their capability tables,
//! loaded component instances, events and version information.

mod component;
mod descriptor;
mod error;
mod event;
mod value;
mod version;

pub use component::{CapabilityRef, ComponentContext, LoadedComponent};
pub use descriptor::{
    ComponentDescriptor, ComponentTables, ConfigTables, DescriptorBuilder, EventFn, LoadFn,
    SetupFn, SetupResult, Subscriptions,
};
pub use error::{ValueError, VersionError};
pub use event::{Event, LifecycleEvent, split_event_type};
pub use value::{MergePolicy, Table, Value, merge_tables};
pub use version::Version;
