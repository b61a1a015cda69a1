//! Records and attribute values.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// The prefix reserved for record metadata keys (`.name`, `.type`, ...).
///
/// Attributes starting with this prefix are never assigned through
/// [`RecordStore::set`](crate::storage::RecordStore::set).
pub const CONTROL_PREFIX: char = '.';

/// The value of a single record attribute.
///
/// Scalars are always held as strings; numbers and booleans found in a
/// persisted document are coerced on load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A scalar value.
    Text(String),
    /// A list of scalar values.
    List(Vec<String>),
}

impl Value {
    /// Returns `true` for an empty string or an empty list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }

    /// Returns the scalar value, if this is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::List(_) => None,
        }
    }

    /// Returns the list items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::Text(_) => None,
            Self::List(items) => Some(items),
        }
    }

    /// Returns the value as a list, wrapping a scalar in a one-element list.
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::Text(text) => vec![text.clone()],
            Self::List(items) => items.clone(),
        }
    }
}

/// Lists are rendered space separated.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for Value {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Text(if value { "1" } else { "0" }.to_string())
    }
}

/// One named, typed configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The record name, unique within its store.
    pub name: String,
    /// The record type (the section type in UCI terms).
    pub section_type: String,
    /// Whether the name was synthesized rather than given explicitly.
    pub anonymous: bool,
    /// Position of the record in the store's total order.
    pub index: usize,
    /// Attribute values keyed by attribute name.
    pub attributes: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        section_type: impl Into<String>,
        anonymous: bool,
        index: usize,
    ) -> Self {
        Self {
            name: name.into(),
            section_type: section_type.into(),
            anonymous,
            index,
            attributes: BTreeMap::new(),
        }
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Builder-style attribute assignment, used when seeding records.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(attribute.into(), value.into());
        self
    }
}
