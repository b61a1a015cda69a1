use std::{collections::HashMap, fmt};

use crate::{
    form::depends::{DependencyGroup, Expected},
    storage::Value,
};

/// How an option behaves when it is parsed and displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKind {
    /// A plain value, optionally offering choices.
    Value,
    /// A value that must be one of the declared choices.
    List,
    /// A list of values. An empty list counts as empty.
    DynamicList,
    /// A checkbox storing one of two strings.
    Flag {
        /// Stored when checked.
        enabled: String,
        /// Stored when unchecked. Also the default.
        disabled: String,
    },
    /// A value that is never displayed.
    Hidden,
    /// A display-only field that never touches the store.
    Dummy,
}

impl OptionKind {
    /// A flag storing `1` and `0`.
    #[must_use]
    pub fn flag() -> Self {
        Self::Flag {
            enabled: "1".to_string(),
            disabled: "0".to_string(),
        }
    }
}

/// A custom validation hook, called with the record and the live value.
pub type Validator = Box<dyn Fn(&str, Option<&Value>) -> Result<(), String>>;

/// The store location an option reads and writes for one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// The configuration.
    pub config: String,
    /// The record.
    pub record: String,
    /// The attribute.
    pub attribute: String,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.config, self.record, self.attribute)
    }
}

/// Binds one attribute of each governed record to a form field.
pub struct FormOption {
    name: String,
    title: String,
    kind: OptionKind,
    tab: Option<String>,

    config: Option<String>,
    record: Option<String>,
    attribute: Option<String>,

    depends: Vec<DependencyGroup>,
    conditional_defaults: Vec<(Value, Vec<DependencyGroup>)>,
    default: Option<Value>,
    choices: Vec<(String, String)>,

    rmempty: bool,
    optional: bool,
    retain: bool,
    forcewrite: bool,
    readonly: bool,

    validator: Option<Validator>,

    stored: HashMap<String, Value>,
    effective_defaults: HashMap<String, Option<Value>>,
}

impl fmt::Debug for FormOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormOption")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("tab", &self.tab)
            .field("config", &self.config)
            .field("record", &self.record)
            .field("attribute", &self.attribute)
            .field("depends", &self.depends)
            .field("default", &self.default)
            .field("rmempty", &self.rmempty)
            .field("optional", &self.optional)
            .field("retain", &self.retain)
            .field("forcewrite", &self.forcewrite)
            .finish_non_exhaustive()
    }
}

impl FormOption {
    /// Creates an option bound to the attribute `name`.
    #[must_use]
    pub fn new(kind: OptionKind, name: impl Into<String>, title: impl Into<String>) -> Self {
        let default = match &kind {
            OptionKind::Flag { disabled, .. } => Some(Value::Text(disabled.clone())),
            _ => None,
        };

        Self {
            name: name.into(),
            title: title.into(),
            kind,
            tab: None,
            config: None,
            record: None,
            attribute: None,
            depends: Vec::new(),
            conditional_defaults: Vec::new(),
            default,
            choices: Vec::new(),
            rmempty: true,
            optional: false,
            retain: false,
            forcewrite: false,
            readonly: false,
            validator: None,
            stored: HashMap::new(),
            effective_defaults: HashMap::new(),
        }
    }

    /// The option name, unique within its section.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The title, falling back to the name when the title is blank.
    #[must_use]
    pub fn title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() { self.name.as_str() } else { title }
    }

    /// The option kind.
    #[must_use]
    pub const fn kind(&self) -> &OptionKind {
        &self.kind
    }

    /// The tab the option is placed on.
    #[must_use]
    pub fn tab(&self) -> Option<&str> {
        self.tab.as_deref()
    }

    pub(crate) fn set_tab(&mut self, tab: impl Into<String>) {
        self.tab = Some(tab.into());
    }

    /// Reads and writes another configuration than the section's.
    pub fn config(&mut self, config: impl Into<String>) -> &mut Self {
        self.config = Some(config.into());
        self
    }

    /// Reads and writes a fixed record instead of the governed one.
    pub fn record(&mut self, record: impl Into<String>) -> &mut Self {
        self.record = Some(record.into());
        self
    }

    /// Reads and writes another attribute than the option name.
    pub fn attribute(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// The configuration override, if any.
    #[must_use]
    pub fn config_override(&self) -> Option<&str> {
        self.config.as_deref()
    }

    /// The record override, if any.
    #[must_use]
    pub fn record_override(&self) -> Option<&str> {
        self.record.as_deref()
    }

    /// Resolves the store location for a governed record.
    ///
    /// `config` is the section's configuration; overrides on the option take
    /// precedence.
    #[must_use]
    pub fn target(&self, config: &str, record: &str) -> Target {
        Target {
            config: self.config.as_deref().unwrap_or(config).to_string(),
            record: self.record.as_deref().unwrap_or(record).to_string(),
            attribute: self.attribute.as_deref().unwrap_or(&self.name).to_string(),
        }
    }

    /// Adds a dependency group with a single condition.
    ///
    /// Each call adds an alternative: the option is active if any group is
    /// satisfied.
    pub fn depends(&mut self, path: &str, expected: impl Into<Expected>) -> &mut Self {
        self.depends_on(DependencyGroup::new().when(path, expected))
    }

    /// Adds a dependency group.
    pub fn depends_on(&mut self, group: DependencyGroup) -> &mut Self {
        if !group.is_empty() {
            self.depends.push(group);
        }
        self
    }

    /// The declared dependency groups.
    #[must_use]
    pub fn dependencies(&self) -> &[DependencyGroup] {
        &self.depends
    }

    /// Sets the default value.
    pub fn default_value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Declares a default that applies while `groups` are satisfied.
    ///
    /// Entries are tried in declaration order. An entry without groups is
    /// the fallback.
    pub fn default_when(&mut self, value: impl Into<Value>, groups: Vec<DependencyGroup>) -> &mut Self {
        self.conditional_defaults.push((value.into(), groups));
        self
    }

    pub(crate) fn conditional_defaults(&self) -> &[(Value, Vec<DependencyGroup>)] {
        &self.conditional_defaults
    }

    /// The default for a record: the conditional default chosen by the last
    /// dependency check, else the declared default.
    #[must_use]
    pub fn default_for(&self, record: &str) -> Option<Value> {
        match self.effective_defaults.get(record) {
            Some(chosen) => chosen.clone(),
            None => self.default.clone(),
        }
    }

    pub(crate) fn set_effective_default(&mut self, record: &str, value: Option<Value>) {
        self.effective_defaults.insert(record.to_string(), value);
    }

    /// Offers a choice. The caption is shown to users; the key is stored.
    pub fn value(&mut self, key: impl Into<String>, caption: impl Into<String>) -> &mut Self {
        self.choices.push((key.into(), caption.into()));
        self
    }

    /// The offered choices as `(key, caption)` pairs.
    #[must_use]
    pub fn choices(&self) -> &[(String, String)] {
        &self.choices
    }

    /// The keys a value is restricted to, for kinds that restrict it.
    #[must_use]
    pub fn allowed_choices(&self) -> Option<Vec<String>> {
        match self.kind {
            OptionKind::List if !self.choices.is_empty() => {
                Some(self.choices.iter().map(|(key, _)| key.clone()).collect())
            }
            _ => None,
        }
    }

    /// Whether an empty value deletes the attribute instead of failing.
    /// Defaults to `true`.
    pub const fn rmempty(&mut self, rmempty: bool) -> &mut Self {
        self.rmempty = rmempty;
        self
    }

    /// Whether the option may be left empty.
    pub const fn optional(&mut self, optional: bool) -> &mut Self {
        self.optional = optional;
        self
    }

    /// Whether the stored value survives the option becoming inactive.
    pub const fn retain(&mut self, retain: bool) -> &mut Self {
        self.retain = retain;
        self
    }

    /// Whether the value is written even when unchanged.
    pub const fn forcewrite(&mut self, forcewrite: bool) -> &mut Self {
        self.forcewrite = forcewrite;
        self
    }

    /// Renders the field read-only.
    pub const fn readonly(&mut self, readonly: bool) -> &mut Self {
        self.readonly = readonly;
        self
    }

    /// Attaches a custom validation hook.
    pub fn validate(&mut self, validator: Validator) -> &mut Self {
        self.validator = Some(validator);
        self
    }

    pub(crate) const fn may_be_empty(&self) -> bool {
        self.rmempty || self.optional
    }

    pub(crate) const fn retains(&self) -> bool {
        self.retain
    }

    pub(crate) const fn forces_write(&self) -> bool {
        self.forcewrite
    }

    pub(crate) const fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub(crate) fn check(&self, record: &str, value: Option<&Value>) -> Result<(), String> {
        self.validator
            .as_ref()
            .map_or(Ok(()), |validator| validator(record, value))
    }

    /// The value known to the store for a record, as of the last load.
    #[must_use]
    pub fn stored_value(&self, record: &str) -> Option<&Value> {
        self.stored.get(record)
    }

    pub(crate) fn clear_stored(&mut self) {
        self.stored.clear();
        self.effective_defaults.clear();
    }

    pub(crate) fn cache_stored(&mut self, record: &str, value: Option<Value>) {
        match value {
            Some(value) => self.stored.insert(record.to_string(), value),
            None => self.stored.remove(record),
        };
    }

    /// The value shown to users: the stored value, else the default.
    ///
    /// Lists are joined with spaces and flags read `Yes` or `No`. Hidden
    /// options display nothing.
    #[must_use]
    pub fn display_value(&self, record: &str) -> Option<String> {
        let value = self
            .stored_value(record)
            .cloned()
            .or_else(|| self.default_for(record));

        match &self.kind {
            OptionKind::Hidden => None,
            OptionKind::Flag { enabled, .. } => {
                let checked = value.as_ref().and_then(Value::as_text) == Some(enabled.as_str());
                Some(if checked { "Yes" } else { "No" }.to_string())
            }
            _ => value.map(|value| value.to_string()),
        }
    }
}
