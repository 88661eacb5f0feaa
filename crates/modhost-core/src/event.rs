//! Events exchanged between components and emitted by the registry.

use serde::{Deserialize, Serialize};

use crate::value::Value;

const EVENT_SEPARATOR: &str = ".events.";

/// An event sent from one component to its subscribers.
///
/// Events are identified by the component that defines them (`source`) and
/// a short `kind`. Their fully qualified type is `"<source>.events.<kind>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Name of the component that defines the event.
    pub source: String,

    /// Event name within the source component.
    pub kind: String,

    /// Data carried by the event.
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    /// Create an event without a payload.
    pub fn new(source: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind: kind.into(),
            payload: Value::Null,
        }
    }

    /// Create an event from its fully qualified type.
    pub fn from_type(event_type: &str) -> Option<Self> {
        let (source, kind) = split_event_type(event_type)?;
        Some(Self::new(source, kind))
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Fully qualified event type.
    pub fn event_type(&self) -> String {
        format!("{}{EVENT_SEPARATOR}{}", self.source, self.kind)
    }
}

/// Split a qualified event type into its source component and event kind.
pub fn split_event_type(event_type: &str) -> Option<(&str, &str)> {
    let (source, kind) = event_type.rsplit_once(EVENT_SEPARATOR)?;
    if source.is_empty() || kind.is_empty() {
        return None;
    }
    Some((source, kind))
}

/// Events emitted by the registry itself.
#[derive(Debug, Clone, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleEvent {
    /// A component finished loading.
    ComponentLoaded {
        /// Registry key of the loaded component.
        name: String,
        /// Name the component answers to. Differs from `name` when the
        /// component replaced another one.
        slot: String,
    },

    /// The registry is shutting down and about to drop every component.
    RegistryShutdown,
}

impl LifecycleEvent {
    /// Event name (`"component_loaded"`, `"registry_shutdown"`).
    pub fn name(&self) -> &str {
        self.as_ref()
    }

    /// Check if this event reports that `component` became available.
    pub fn announces(&self, component: &str) -> bool {
        match self {
            Self::ComponentLoaded { name, slot } => name == component || slot == component,
            Self::RegistryShutdown => false,
        }
    }
}
