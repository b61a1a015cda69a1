//! Declarative form descriptions.
//!
//! A blueprint describes a [`Map`] in TOML:
//!
//! ```toml
//! config = "network"
//! title = "Interfaces"
//!
//! [[section]]
//! type = "interface"
//! title = "Interfaces"
//!
//! [[section.option]]
//! name = "proto"
//! kind = "list"
//! title = "Protocol"
//! rmempty = false
//! choices = [["static", "Static address"], ["dhcp", "DHCP client"]]
//!
//! [[section.option]]
//! name = "ipaddr"
//! title = "IPv4 address"
//! depends = [{ proto = "static" }]
//! ```

use std::{path::Path, rc::Rc};

use serde::Deserialize;

use crate::{
    form::{
        FormError, Map,
        depends::DependencyGroup,
        option::{FormOption, OptionKind},
        section::{Section, SectionKind},
    },
    storage::{RecordStore, Value},
};

/// A form description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Blueprint {
    /// The primary configuration.
    pub config: String,
    /// Further configurations to load.
    #[serde(default)]
    pub chain: Vec<String>,
    /// The form title.
    #[serde(default)]
    pub title: String,
    /// Forces the readonly state.
    #[serde(default)]
    pub readonly: Option<bool>,
    /// The sections.
    #[serde(default, rename = "section")]
    pub sections: Vec<SectionBlueprint>,
}

/// A section description. Giving a `name` makes it a named section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionBlueprint {
    /// The record type.
    #[serde(rename = "type")]
    pub section_type: String,
    /// The single record governed by a named section.
    #[serde(default)]
    pub name: Option<String>,
    /// The section title.
    #[serde(default)]
    pub title: String,
    /// Reads another configuration than the map's.
    #[serde(default)]
    pub config: Option<String>,
    /// Tabs as `[name, title]` pairs.
    #[serde(default)]
    pub tabs: Vec<(String, String)>,
    /// The options.
    #[serde(default, rename = "option")]
    pub options: Vec<OptionBlueprint>,
}

/// The option kinds a description can name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindName {
    /// [`OptionKind::Value`].
    #[default]
    Value,
    /// [`OptionKind::List`].
    List,
    /// [`OptionKind::DynamicList`].
    DynamicList,
    /// [`OptionKind::Flag`].
    Flag,
    /// [`OptionKind::Hidden`].
    Hidden,
    /// [`OptionKind::Dummy`].
    Dummy,
}

/// A conditional default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultBlueprint {
    /// The default value.
    pub value: Value,
    /// When it applies. Empty for the fallback.
    #[serde(default)]
    pub depends: Vec<DependencyGroup>,
}

/// An option description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionBlueprint {
    /// The option name.
    pub name: String,
    /// The option kind.
    #[serde(default)]
    pub kind: KindName,
    /// The option title.
    #[serde(default)]
    pub title: String,
    /// The tab to place the option on.
    #[serde(default)]
    pub tab: Option<String>,
    /// Configuration override.
    #[serde(default)]
    pub config: Option<String>,
    /// Record override.
    #[serde(default)]
    pub record: Option<String>,
    /// Attribute override.
    #[serde(default)]
    pub attribute: Option<String>,
    /// The default value.
    #[serde(default)]
    pub default: Option<Value>,
    /// Conditional defaults.
    #[serde(default)]
    pub default_when: Vec<DefaultBlueprint>,
    /// Choices as `[key, caption]` pairs.
    #[serde(default)]
    pub choices: Vec<(String, String)>,
    /// Dependency groups, any of which activates the option.
    #[serde(default)]
    pub depends: Vec<DependencyGroup>,
    /// Stored value for a checked flag.
    #[serde(default)]
    pub enabled: Option<String>,
    /// Stored value for an unchecked flag.
    #[serde(default)]
    pub disabled: Option<String>,
    /// See [`FormOption::rmempty`].
    #[serde(default = "default_true")]
    pub rmempty: bool,
    /// See [`FormOption::optional`].
    #[serde(default)]
    pub optional: bool,
    /// See [`FormOption::retain`].
    #[serde(default)]
    pub retain: bool,
    /// See [`FormOption::forcewrite`].
    #[serde(default)]
    pub forcewrite: bool,
    /// See [`FormOption::readonly`].
    #[serde(default)]
    pub readonly: bool,
}

const fn default_true() -> bool {
    true
}

impl Blueprint {
    /// Parses a TOML description.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Blueprint`] if the text is not a valid
    /// description.
    pub fn from_toml(text: &str) -> Result<Self, FormError> {
        toml::from_str(text).map_err(|e| FormError::Blueprint(e.to_string()))
    }

    /// Reads a TOML description from a file.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Blueprint`] if the file cannot be read or is not
    /// a valid description.
    pub fn load(path: &Path) -> Result<Self, FormError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FormError::Blueprint(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Builds the described form against a store.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::DuplicateTab`] or [`FormError::UnknownTab`] for
    /// inconsistent tabs.
    pub fn build(&self, store: Rc<dyn RecordStore>) -> Result<Map, FormError> {
        let mut map = Map::new(store, self.config.clone(), self.title.clone());
        for config in &self.chain {
            map.chain(config.clone());
        }
        if let Some(readonly) = self.readonly {
            map.set_readonly(readonly);
        }

        for blueprint in &self.sections {
            map.push_section(blueprint.build()?);
        }

        Ok(map)
    }
}

impl SectionBlueprint {
    fn build(&self) -> Result<Section, FormError> {
        let kind = match &self.name {
            Some(name) => SectionKind::Named {
                name: name.clone(),
                section_type: self.section_type.clone(),
            },
            None => SectionKind::Typed {
                section_type: self.section_type.clone(),
            },
        };

        let mut section = Section::new(kind, self.title.clone());
        if let Some(config) = &self.config {
            section.config(config.clone());
        }
        for (name, title) in &self.tabs {
            section.tab(name.clone(), title.clone())?;
        }

        for blueprint in &self.options {
            let kind = blueprint.kind();
            let option = match &blueprint.tab {
                Some(tab) => section.taboption(tab, kind, blueprint.name.clone(), blueprint.title.clone())?,
                None => section.option(kind, blueprint.name.clone(), blueprint.title.clone()),
            };
            blueprint.apply(option);
        }

        Ok(section)
    }
}

impl OptionBlueprint {
    fn kind(&self) -> OptionKind {
        match self.kind {
            KindName::Value => OptionKind::Value,
            KindName::List => OptionKind::List,
            KindName::DynamicList => OptionKind::DynamicList,
            KindName::Hidden => OptionKind::Hidden,
            KindName::Dummy => OptionKind::Dummy,
            KindName::Flag => OptionKind::Flag {
                enabled: self.enabled.clone().unwrap_or_else(|| "1".to_string()),
                disabled: self.disabled.clone().unwrap_or_else(|| "0".to_string()),
            },
        }
    }

    fn apply(&self, option: &mut FormOption) {
        if let Some(config) = &self.config {
            option.config(config.clone());
        }
        if let Some(record) = &self.record {
            option.record(record.clone());
        }
        if let Some(attribute) = &self.attribute {
            option.attribute(attribute.clone());
        }
        if let Some(default) = &self.default {
            option.default_value(default.clone());
        }
        for entry in &self.default_when {
            option.default_when(entry.value.clone(), entry.depends.clone());
        }
        for (key, caption) in &self.choices {
            option.value(key.clone(), caption.clone());
        }
        for group in &self.depends {
            option.depends_on(group.clone());
        }

        option
            .rmempty(self.rmempty)
            .optional(self.optional)
            .retain(self.retain)
            .forcewrite(self.forcewrite)
            .readonly(self.readonly);
    }
}
