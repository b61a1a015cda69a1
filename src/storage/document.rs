//! Serialized form of a configuration namespace.
//!
//! A document is an ordered sequence of typed records. Each record is a flat
//! attribute map plus the reserved metadata keys `.name`, `.type`,
//! `.anonymous` and `.index`:
//!
//! ```toml
//! [[record]]
//! ".type" = "interface"
//! ".name" = "wan"
//! proto = "dhcp"
//! dns = ["1.1.1.1", "9.9.9.9"]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::storage::{
    StoreError,
    package::Package,
    record::{CONTROL_PREFIX, Record, Value},
};

/// The on-disk shape of one configuration namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The records, in file order.
    #[serde(default, rename = "record", skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordDocument>,
}

/// One record as it appears in a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDocument {
    /// The record type.
    #[serde(rename = ".type")]
    pub section_type: String,

    /// The record name. Anonymous records may omit it.
    #[serde(rename = ".name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Marks a record whose name was synthesized.
    #[serde(rename = ".anonymous", default, skip_serializing_if = "is_false")]
    pub anonymous: bool,

    /// Explicit ordering index.
    #[serde(rename = ".index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    /// The attribute values.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// An attribute value as written in a document.
///
/// Numbers and booleans are accepted and coerced to strings on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A scalar.
    Scalar(Scalar),
    /// A list of scalars.
    List(Vec<Scalar>),
}

/// A scalar as written in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// A string.
    Text(String),
    /// A boolean, stored as `1`/`0`.
    Bool(bool),
    /// An integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => text,
            Scalar::Bool(flag) => if flag { "1" } else { "0" }.to_string(),
            Scalar::Integer(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
        }
    }
}

impl From<AttributeValue> for Value {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Scalar(scalar) => Self::Text(scalar.into()),
            AttributeValue::List(items) => Self::List(items.into_iter().map(String::from).collect()),
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Text(text) => Self::Scalar(Scalar::Text(text)),
            Value::List(items) => Self::List(items.into_iter().map(Scalar::Text).collect()),
        }
    }
}

/// The text formats a [`Document`] can be stored in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// TOML `[[record]]` tables.
    #[default]
    Toml,
    /// JSON, in either shape [`Document::from_json`] accepts.
    Json,
    /// YAML with the same shape as TOML.
    Yaml,
}

impl Format {
    /// Picks the format matching a file extension. Unknown extensions are
    /// read and written as TOML.
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            _ => Self::Toml,
        }
    }
}

impl Document {
    /// Parses a document in the given format.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Document`] if the text is not a valid document.
    pub fn parse(text: &str, format: Format) -> Result<Self, StoreError> {
        match format {
            Format::Toml => Self::from_toml(text),
            Format::Json => Self::from_json(text),
            Format::Yaml => Self::from_yaml(text),
        }
    }

    /// Serializes the document in the given format.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] if serialization fails.
    pub fn render(&self, format: Format) -> Result<String, StoreError> {
        match format {
            Format::Toml => self.to_toml(),
            Format::Json => serde_json::to_string_pretty(self)
                .map_err(|e| StoreError::Serialize(e.to_string())),
            Format::Yaml => {
                serde_yaml::to_string(self).map_err(|e| StoreError::Serialize(e.to_string()))
            }
        }
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Document`] if the text is not a valid document.
    pub fn from_toml(text: &str) -> Result<Self, StoreError> {
        toml::from_str(text).map_err(|e| StoreError::Document(e.to_string()))
    }

    /// Serializes the document as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, StoreError> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Serialize(e.to_string()))
    }

    /// Parses a YAML document with the same shape as the TOML one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Document`] if the text is not a valid document.
    pub fn from_yaml(text: &str) -> Result<Self, StoreError> {
        serde_yaml::from_str(text).map_err(|e| StoreError::Document(e.to_string()))
    }

    /// Parses JSON.
    ///
    /// Two shapes are accepted: the document shape
    /// (`{"record": [{".type": ..}, ..]}`) and a type-keyed map where each
    /// key is a record type holding either an array of anonymous records or
    /// a single object, which becomes a record named after its type:
    ///
    /// ```json
    /// { "interface": [ { "proto": "dhcp" } ], "globals": { "ula": "fd00::/48" } }
    /// ```
    ///
    /// Array items may carry a `.name` to become named records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Document`] if the text is not valid JSON or
    /// matches neither shape.
    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| StoreError::Document(e.to_string()))?;

        let serde_json::Value::Object(map) = value else {
            return Err(StoreError::Document(
                "expected a JSON object at the top level".to_string(),
            ));
        };

        if map.contains_key("record") {
            return serde_json::from_value(serde_json::Value::Object(map))
                .map_err(|e| StoreError::Document(e.to_string()));
        }

        let mut records = Vec::new();
        for (section_type, entry) in map {
            match entry {
                serde_json::Value::Array(items) => {
                    for item in items {
                        if item.is_object() {
                            records.push(record_from_json(&section_type, None, item)?);
                        }
                    }
                }
                object @ serde_json::Value::Object(_) => {
                    records.push(record_from_json(
                        &section_type,
                        Some(section_type.clone()),
                        object,
                    )?);
                }
                _ => {}
            }
        }

        Ok(Self { records })
    }

    /// Converts the document into a package.
    ///
    /// Records without a name are named after their type and position in
    /// the document (`interface0`, `rule3`, ...) and marked anonymous.
    #[must_use]
    pub fn into_package(self) -> Package {
        let loaded = self
            .records
            .into_iter()
            .enumerate()
            .map(|(position, doc)| {
                let anonymous = doc.anonymous || doc.name.is_none();
                let name = doc
                    .name
                    .unwrap_or_else(|| format!("{}{position}", doc.section_type));

                let mut record = Record::new(name, doc.section_type, anonymous, 0);
                record.attributes = doc
                    .attributes
                    .into_iter()
                    .filter(|(key, _)| !key.starts_with(CONTROL_PREFIX))
                    .map(|(key, value)| (key, value.into()))
                    .collect();

                (record, doc.index)
            });

        Package::from_loaded(loaded)
    }

    /// Captures a package as a document, in index order.
    #[must_use]
    pub fn from_package(package: &Package) -> Self {
        let records = package
            .iter()
            .map(|record| RecordDocument {
                section_type: record.section_type.clone(),
                name: Some(record.name.clone()),
                anonymous: record.anonymous,
                index: Some(record.index),
                attributes: record
                    .attributes
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone().into()))
                    .collect(),
            })
            .collect();

        Self { records }
    }
}

fn record_from_json(
    section_type: &str,
    name: Option<String>,
    item: serde_json::Value,
) -> Result<RecordDocument, StoreError> {
    let mut attributes: BTreeMap<String, serde_json::Value> =
        serde_json::from_value(item).map_err(|e| StoreError::Document(e.to_string()))?;

    let explicit_name = match attributes.remove(".name") {
        Some(serde_json::Value::String(name)) => Some(name),
        _ => None,
    };
    let index = attributes
        .remove(".index")
        .and_then(|index| index.as_u64())
        .and_then(|index| usize::try_from(index).ok());

    let attributes = attributes
        .into_iter()
        .filter(|(key, value)| !key.starts_with(CONTROL_PREFIX) && !value.is_null())
        .map(|(key, value)| {
            serde_json::from_value(value)
                .map(|value| (key.clone(), value))
                .map_err(|e| StoreError::Document(format!("attribute '{key}': {e}")))
        })
        .collect::<Result<_, _>>()?;

    Ok(RecordDocument {
        section_type: section_type.to_string(),
        anonymous: name.is_none() && explicit_name.is_none(),
        name: explicit_name.or(name),
        index,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const NETWORK: &str = r#"
[[record]]
".type" = "interface"
".name" = "wan"
proto = "static"
mtu = 1500
dns = ["1.1.1.1", "9.9.9.9"]

[[record]]
".type" = "interface"
".name" = "lan"
".index" = 0
auto = true

[[record]]
".type" = "route"
target = "10.0.0.0/8"
"#;

    #[test]
    fn toml_records_become_a_package() {
        let package = Document::from_toml(NETWORK).unwrap().into_package();

        let names: Vec<_> = package.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["lan", "route2", "wan"]);

        assert_eq!(package.get("wan", "mtu"), Some(&Value::from("1500")));
        assert_eq!(package.get("lan", "auto"), Some(&Value::from("1")));
        assert_eq!(
            package.get("wan", "dns"),
            Some(&Value::from(vec!["1.1.1.1", "9.9.9.9"]))
        );
        assert!(package.record("route2").unwrap().anonymous);
        assert!(!package.record("wan").unwrap().anonymous);
    }

    #[test]
    fn package_survives_a_toml_round_trip() {
        let package = Document::from_toml(NETWORK).unwrap().into_package();

        let text = Document::from_package(&package).to_toml().unwrap();
        let reloaded = Document::from_toml(&text).unwrap().into_package();

        assert_eq!(reloaded, package);
    }

    #[test]
    fn json_type_map_shape() {
        let document = Document::from_json(
            r#"{
                "interface": [ { "proto": "dhcp" }, { ".name": "wan", "proto": "pppoe" } ],
                "globals": { "ula_prefix": "fd00::/48", "packet_steering": 1 }
            }"#,
        )
        .unwrap();
        let package = document.into_package();

        let globals = package.record("globals").unwrap();
        assert!(!globals.anonymous);
        assert_eq!(globals.get("packet_steering"), Some(&Value::from("1")));

        let anonymous: Vec<_> = package
            .sections(Some("interface"))
            .into_iter()
            .filter(|r| r.anonymous)
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(anonymous.len(), 1);
        assert_eq!(
            package.get("wan", "proto"),
            Some(&Value::from("pppoe"))
        );
    }

    #[test]
    fn yaml_document_shape() {
        let document = Document::from_yaml(
            "record:\n  - .type: system\n    .name: main\n    hostname: OpenWrt\n",
        )
        .unwrap();

        let package = document.into_package();
        assert_eq!(package.get("main", "hostname"), Some(&Value::from("OpenWrt")));
    }

    #[test]
    fn rejects_non_object_json() {
        let error = Document::from_json("[1, 2]").unwrap_err();
        assert!(matches!(error, StoreError::Document(_)));
    }

    #[test_case("json", Format::Json; "json")]
    #[test_case("yml", Format::Yaml; "short yaml")]
    #[test_case("YAML", Format::Yaml; "upper case yaml")]
    #[test_case("conf", Format::Toml; "unknown")]
    fn formats_follow_the_extension(extension: &str, format: Format) {
        assert_eq!(Format::from_extension(extension), format);
    }

    #[test_case(Format::Json; "json")]
    #[test_case(Format::Yaml; "yaml")]
    fn packages_survive_other_formats(format: Format) {
        let package = Document::from_toml(NETWORK).unwrap().into_package();

        let text = Document::from_package(&package).render(format).unwrap();
        let reloaded = Document::parse(&text, format).unwrap().into_package();

        assert_eq!(reloaded, package);
    }
}
