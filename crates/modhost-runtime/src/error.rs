//! Error types for the component runtime.

use std::path::PathBuf;

use modhost_core::ValueError;
use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur while loading components.
///
/// Every failure during resolution is reported to the caller of
/// [`Registry::load`](crate::Registry::load) after the registry has been
/// rolled back; none of them abort the host.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Setup returned nothing or reported failure.
    #[error("Setup of component '{name}' failed: {reason}")]
    SetupFailed { name: String, reason: String },

    /// No descriptor is known for the name.
    #[error("No descriptor found for component '{name}'")]
    MissingDescriptor { name: String },

    /// A wanted dependency is not enabled by the host.
    #[error("Component '{component}' wants '{want}', which is not enabled in the host configuration")]
    UnsatisfiedWant { component: String, want: String },

    /// A required or wanted dependency failed to load.
    #[error("Component '{component}' could not load dependency '{dependency}'")]
    DependencyLoadFailed {
        component: String,
        dependency: String,
        #[source]
        source: Box<RegistryError>,
    },

    /// The replacement target was already replaced once.
    #[error("Component '{component}' cannot replace '{target}': it has already been replaced")]
    DoubleReplacement { component: String, target: String },

    /// A declared import has no descriptor.
    #[error("Component '{component}' imports '{import}', but no descriptor exists for it")]
    ImportNotFound { component: String, import: String },

    /// Dependencies form a cycle.
    #[error("Dependency cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// The component is not loaded.
    #[error("Component '{name}' is not loaded")]
    NotLoaded { name: String },

    /// A capability table did not have the shape the caller expected.
    #[error("Public API of component '{name}' has an unexpected shape: {source}")]
    Conversion {
        name: String,
        #[source]
        source: ValueError,
    },

    /// Invalid host configuration.
    #[error("Invalid host configuration: {message}")]
    Config { message: String },

    /// Invalid component manifest.
    #[error("Invalid manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discriminant of [`RegistryError`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    SetupFailed,
    MissingDescriptor,
    UnsatisfiedWant,
    DependencyLoadFailed,
    DoubleReplacement,
    ImportNotFound,
    CycleDetected,
    NotLoaded,
    Conversion,
    Config,
    Manifest,
    Io,
}

impl RegistryError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SetupFailed { .. } => ErrorKind::SetupFailed,
            Self::MissingDescriptor { .. } => ErrorKind::MissingDescriptor,
            Self::UnsatisfiedWant { .. } => ErrorKind::UnsatisfiedWant,
            Self::DependencyLoadFailed { .. } => ErrorKind::DependencyLoadFailed,
            Self::DoubleReplacement { .. } => ErrorKind::DoubleReplacement,
            Self::ImportNotFound { .. } => ErrorKind::ImportNotFound,
            Self::CycleDetected { .. } => ErrorKind::CycleDetected,
            Self::NotLoaded { .. } => ErrorKind::NotLoaded,
            Self::Conversion { .. } => ErrorKind::Conversion,
            Self::Config { .. } => ErrorKind::Config,
            Self::Manifest { .. } => ErrorKind::Manifest,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// The innermost error behind a chain of dependency failures.
    pub fn root_cause(&self) -> &RegistryError {
        match self {
            Self::DependencyLoadFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Wrap this error as the failure of `component`'s dependency.
    pub(crate) fn in_dependency(self, component: &str, dependency: &str) -> Self {
        match self {
            // A cycle is reported once, with its full path.
            cycle @ Self::CycleDetected { .. } => cycle,
            source => Self::DependencyLoadFailed {
                component: component.to_string(),
                dependency: dependency.to_string(),
                source: Box::new(source),
            },
        }
    }
}
