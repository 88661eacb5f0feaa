//! Error types for values and versions.

use thiserror::Error;

/// Errors produced when converting dynamic values.
#[derive(Debug, Error)]
pub enum ValueError {
    /// A value had a different shape than expected.
    #[error("Expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Conversion to or from a typed structure failed.
    #[error("Value conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),
}

/// Errors produced when parsing a semantic version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The string did not contain exactly three dot-separated parts.
    #[error("Version '{input}' must have the form major.minor.patch")]
    Malformed { input: String },

    /// One of the parts was not a non-negative integer.
    #[error("Version '{input}' has a non-numeric {part} component")]
    NotNumeric { input: String, part: &'static str },
}
