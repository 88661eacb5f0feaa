//! Semantic version parsing for component public tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VersionError;

/// A `major.minor.patch` version advertised by a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Create a new version.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string, returning `None` if it is malformed.
    pub fn parse(input: &str) -> Option<Self> {
        input.parse().ok()
    }
}

impl FromStr for Version {
    type Err = VersionError;

    /// Accepts an optional leading `v` and ignores any pre-release or build
    /// suffix (`1.2.3-beta+7` parses as `1.2.3`).
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = trimmed
            .split(|c: char| c == '-' || c == '+')
            .next()
            .unwrap_or_default();

        let parts: Vec<&str> = core.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(VersionError::Malformed {
                input: input.to_string(),
            });
        };

        let number = |text: &str, part: &'static str| {
            text.parse::<u64>().map_err(|_| VersionError::NotNumeric {
                input: input.to_string(),
                part,
            })
        };

        Ok(Self {
            major: number(*major, "major")?,
            minor: number(*minor, "minor")?,
            patch: number(*patch, "patch")?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
