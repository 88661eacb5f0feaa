//! Dynamic values stored in component capability tables.
//!
//! Component state, public APIs and configuration are all trees of [`Value`].
//! Hotswapping and configuration overrides combine two trees with
//! [`Value::deep_merge`], which merges nested objects key by key instead of
//! replacing them wholesale.

use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// An ordered string-keyed table of values.
pub type Table = IndexMap<String, Value>;

/// A dynamic value held in a capability table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(untagged)]
#[strum(serialize_all = "snake_case")]
pub enum Value {
    /// Null/absent value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Integer value.
    Integer(i64),

    /// Floating point value.
    Float(f64),

    /// String value.
    String(String),

    /// Array/list value.
    Array(Vec<Value>),

    /// Object/table value. Keys keep their insertion order.
    Object(Table),

    /// Binary data.
    Bytes(Vec<u8>),
}

/// How conflicting scalar values are resolved during a deep merge.
///
/// Objects on both sides are always merged recursively; the policy only
/// decides which side wins when two non-object values meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// The incoming value overwrites the existing one.
    #[default]
    PreferIncoming,

    /// The existing value is kept; incoming values only fill gaps.
    KeepExisting,
}

impl Value {
    /// Create an empty object.
    pub fn object() -> Self {
        Self::Object(Table::new())
    }

    /// Name of the variant, used in conversion errors.
    pub fn kind_name(&self) -> &'static str {
        self.into()
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this value carries no data (null or an empty container).
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            Self::Array(arr) => arr.is_empty(),
            Self::Object(obj) => obj.is_empty(),
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Bool(_) | Self::Integer(_) | Self::Float(_) => false,
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to get this value as an object.
    pub fn as_object(&self) -> Option<&Table> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Try to get this value as a mutable object.
    pub fn as_object_mut(&mut self) -> Option<&mut Table> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Consume this value, returning its table if it is an object.
    pub fn into_object(self) -> Result<Table, ValueError> {
        match self {
            Self::Object(obj) => Ok(obj),
            other => Err(ValueError::TypeMismatch {
                expected: "object",
                found: other.kind_name(),
            }),
        }
    }

    /// Look up a nested value by a dot-separated key path (`"a.b.c"`).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(self, |value, key| value.as_object()?.get(key))
    }

    /// Merge `incoming` into this value.
    ///
    /// Objects are merged key by key, recursing into nested objects. For any
    /// other pair of values the [`MergePolicy`] decides the winner. A null
    /// existing value is always filled.
    pub fn deep_merge(&mut self, incoming: Value, policy: MergePolicy) {
        match (self, incoming) {
            (Self::Object(existing), Self::Object(incoming)) => {
                merge_tables(existing, incoming, policy);
            }
            (slot, incoming) => {
                if policy == MergePolicy::PreferIncoming || slot.is_null() {
                    *slot = incoming;
                }
            }
        }
    }

    /// Convert this value into a typed structure.
    ///
    /// Used at the boundary where a consumer expects a specific component's
    /// shape instead of a dynamic table.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        let json = serde_json::to_value(self)?;
        Ok(serde_json::from_value(json)?)
    }

    /// Build a value from any serializable structure.
    pub fn from_typed<T: Serialize>(value: &T) -> Result<Self, ValueError> {
        let json = serde_json::to_value(value)?;
        Ok(serde_json::from_value(json)?)
    }
}

/// Merge `incoming` into `existing` key by key.
pub fn merge_tables(existing: &mut Table, incoming: Table, policy: MergePolicy) {
    for (key, value) in incoming {
        match existing.get_mut(&key) {
            Some(slot) => slot.deep_merge(value, policy),
            None => {
                existing.insert(key, value);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Array(_) | Self::Object(_) => {
                let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i as i64)
    }
}

impl From<u64> for Value {
    /// Values above `i64::MAX` become floats rather than wrapping.
    fn from(u: u64) -> Self {
        i64::try_from(u).map_or(Self::Float(u as f64), Self::Integer)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(arr: Vec<T>) -> Self {
        Self::Array(arr.into_iter().map(Into::into).collect())
    }
}

impl From<Table> for Value {
    fn from(obj: Table) -> Self {
        Self::Object(obj)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Object(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
