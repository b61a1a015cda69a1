use std::fmt;

use crate::{
    form::{
        FormError,
        option::{FormOption, OptionKind},
    },
    storage::RecordStore,
};

/// Which records a section governs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    /// Every record of a type, in index order.
    Typed {
        /// The record type.
        section_type: String,
    },
    /// Exactly one record, whether or not it exists.
    Named {
        /// The record name.
        name: String,
        /// The type given to the record when it is added.
        section_type: String,
    },
}

/// A tab grouping some of a section's options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    /// The tab name.
    pub name: String,
    /// The tab caption.
    pub title: String,
}

/// A predicate deciding whether a typed section governs a record.
pub type Filter = Box<dyn Fn(&str) -> bool>;

/// A group of options bound to the records a section governs.
pub struct Section {
    kind: SectionKind,
    title: String,
    config: Option<String>,
    filter: Option<Filter>,
    options: Vec<FormOption>,
    tabs: Vec<Tab>,
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("config", &self.config)
            .field("filtered", &self.filter.is_some())
            .field("options", &self.options)
            .field("tabs", &self.tabs)
            .finish()
    }
}

impl Section {
    /// Creates a section.
    #[must_use]
    pub fn new(kind: SectionKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            config: None,
            filter: None,
            options: Vec::new(),
            tabs: Vec::new(),
        }
    }

    /// What the section governs.
    #[must_use]
    pub const fn kind(&self) -> &SectionKind {
        &self.kind
    }

    /// The type of the governed records.
    #[must_use]
    pub fn section_type(&self) -> &str {
        match &self.kind {
            SectionKind::Typed { section_type } | SectionKind::Named { section_type, .. } => {
                section_type
            }
        }
    }

    /// The section title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Binds the section to another configuration than the map's.
    pub fn config(&mut self, config: impl Into<String>) -> &mut Self {
        self.config = Some(config.into());
        self
    }

    /// The configuration the section reads, given the map's primary one.
    #[must_use]
    pub fn config_or<'a>(&'a self, primary: &'a str) -> &'a str {
        self.config.as_deref().unwrap_or(primary)
    }

    /// Restricts a typed section to records accepted by `filter`.
    pub fn filter(&mut self, filter: Filter) -> &mut Self {
        self.filter = Some(filter);
        self
    }

    /// The names of the governed records.
    ///
    /// Derived from the store on every call.
    #[must_use]
    pub fn cfgsections(&self, store: &dyn RecordStore, config: &str) -> Vec<String> {
        match &self.kind {
            SectionKind::Named { name, .. } => vec![name.clone()],
            SectionKind::Typed { section_type } => store
                .sections(config, Some(section_type))
                .into_iter()
                .map(|record| record.name)
                .filter(|name| self.filter.as_ref().is_none_or(|filter| filter(name)))
                .collect(),
        }
    }

    /// Adds an option.
    pub fn option(
        &mut self,
        kind: OptionKind,
        name: impl Into<String>,
        title: impl Into<String>,
    ) -> &mut FormOption {
        self.options.push(FormOption::new(kind, name, title));
        let last = self.options.len() - 1;
        &mut self.options[last]
    }

    /// Declares a tab.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::DuplicateTab`] if the tab already exists.
    pub fn tab(&mut self, name: impl Into<String>, title: impl Into<String>) -> Result<(), FormError> {
        let name = name.into();
        if self.tabs.iter().any(|tab| tab.name == name) {
            return Err(FormError::DuplicateTab(name));
        }
        self.tabs.push(Tab {
            name,
            title: title.into(),
        });
        Ok(())
    }

    /// Adds an option to a declared tab.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnknownTab`] if the tab was never declared.
    pub fn taboption(
        &mut self,
        tab: &str,
        kind: OptionKind,
        name: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<&mut FormOption, FormError> {
        if !self.tabs.iter().any(|t| t.name == tab) {
            return Err(FormError::UnknownTab(tab.to_string()));
        }
        let option = self.option(kind, name, title);
        option.set_tab(tab);
        Ok(option)
    }

    /// The declared tabs.
    #[must_use]
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    /// The options, in declaration order.
    #[must_use]
    pub fn options(&self) -> &[FormOption] {
        &self.options
    }

    pub(crate) fn options_mut(&mut self) -> &mut [FormOption] {
        &mut self.options
    }

    /// Looks up an option by name.
    #[must_use]
    pub fn option_named(&self, name: &str) -> Option<&FormOption> {
        self.options.iter().find(|option| option.name() == name)
    }

    /// Looks up an option by name, mutably.
    pub fn option_named_mut(&mut self, name: &str) -> Option<&mut FormOption> {
        self.options.iter_mut().find(|option| option.name() == name)
    }
}
