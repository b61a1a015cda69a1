use std::{
    fmt,
    ops::{Index, IndexMut},
    rc::Rc,
};

use futures::future::join_all;
use tracing::{debug, error, instrument, warn};

use crate::{
    form::{
        DependencyReport, FormError,
        depends::OptionPath,
        section::{Section, SectionKind},
        widget::{FieldContext, MemoryWidgetFactory, Widget, WidgetFactory, WidgetKey, WidgetRegistry},
    },
    storage::RecordStore,
};

/// The default bound on dependency passes beyond the first.
pub const DEFAULT_PASS_LIMIT: usize = 10;

/// Identifies a section within its [`Map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub usize);

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A hook run after parsing and before the store is saved.
pub type PreCommit<'a> = &'a mut dyn FnMut(&dyn RecordStore) -> Result<(), FormError>;

/// The root of a form: a record store, the sections bound to it and the
/// rendered fields.
pub struct Map {
    config: String,
    chain: Vec<String>,
    title: String,
    store: Rc<dyn RecordStore>,
    sections: Vec<Section>,
    pub(crate) widgets: WidgetRegistry,
    factory: Box<dyn WidgetFactory>,
    readonly: Option<bool>,
    pass_limit: usize,
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("config", &self.config)
            .field("chain", &self.chain)
            .field("title", &self.title)
            .field("sections", &self.sections)
            .field("widgets", &self.widgets)
            .field("readonly", &self.readonly)
            .field("pass_limit", &self.pass_limit)
            .finish_non_exhaustive()
    }
}

impl Map {
    /// Creates a form bound to `config` in `store`.
    #[must_use]
    pub fn new(store: Rc<dyn RecordStore>, config: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            chain: Vec::new(),
            title: title.into(),
            store,
            sections: Vec::new(),
            widgets: WidgetRegistry::default(),
            factory: Box::new(MemoryWidgetFactory),
            readonly: None,
            pass_limit: DEFAULT_PASS_LIMIT,
        }
    }

    /// Replaces the factory used to create widgets.
    #[must_use]
    pub fn with_factory(mut self, factory: Box<dyn WidgetFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Bounds the number of dependency passes after the first.
    #[must_use]
    pub const fn with_pass_limit(mut self, limit: usize) -> Self {
        self.pass_limit = limit;
        self
    }

    /// Loads another configuration alongside the primary one.
    pub fn chain(&mut self, config: impl Into<String>) -> &mut Self {
        self.chain.push(config.into());
        self
    }

    /// Forces the readonly state instead of probing the store.
    pub const fn set_readonly(&mut self, readonly: bool) -> &mut Self {
        self.readonly = Some(readonly);
        self
    }

    /// The primary configuration.
    #[must_use]
    pub fn config(&self) -> &str {
        &self.config
    }

    /// The form title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Whether the form is read-only. `None` until loaded or forced.
    #[must_use]
    pub const fn readonly(&self) -> Option<bool> {
        self.readonly
    }

    pub(crate) const fn pass_limit(&self) -> usize {
        self.pass_limit
    }

    /// The store the form is bound to.
    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Adds a section governing every record of `section_type`.
    pub fn typed_section(&mut self, section_type: impl Into<String>, title: impl Into<String>) -> SectionId {
        self.push_section(Section::new(
            SectionKind::Typed {
                section_type: section_type.into(),
            },
            title,
        ))
    }

    /// Adds a section governing the single record `name`.
    pub fn named_section(
        &mut self,
        name: impl Into<String>,
        section_type: impl Into<String>,
        title: impl Into<String>,
    ) -> SectionId {
        self.push_section(Section::new(
            SectionKind::Named {
                name: name.into(),
                section_type: section_type.into(),
            },
            title,
        ))
    }

    /// Adds a section built elsewhere.
    pub fn push_section(&mut self, section: Section) -> SectionId {
        self.sections.push(section);
        SectionId(self.sections.len() - 1)
    }

    /// The sections, in declaration order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub(crate) fn section_ids(&self) -> impl Iterator<Item = SectionId> + use<> {
        (0..self.sections.len()).map(SectionId)
    }

    /// Returns a section, if the id is valid.
    #[must_use]
    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.0)
    }

    /// The configuration a section reads.
    #[must_use]
    pub fn section_config(&self, id: SectionId) -> &str {
        self[id].config_or(&self.config)
    }

    /// The records a section currently governs.
    #[must_use]
    pub fn cfgsections(&self, id: SectionId) -> Vec<String> {
        self[id].cfgsections(self.store.as_ref(), self.section_config(id))
    }

    /// Refreshes the stored value of every option.
    ///
    /// Probes write access first unless the readonly state was forced.
    /// Chained configurations that fail to load are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Store`] if the primary configuration cannot be
    /// loaded.
    #[instrument(skip(self), fields(config = %self.config))]
    pub async fn load(&mut self) -> Result<(), FormError> {
        let store = Rc::clone(&self.store);

        if self.readonly.is_none() {
            let writable = store.can_write(&self.config).await;
            debug!(writable, "probed write access");
            self.readonly = Some(!writable);
        }

        let chained = join_all(self.chain.iter().map(|config| store.load(config)));
        let (primary, chained) = futures::join!(store.load(&self.config), chained);
        primary?;
        for (config, result) in self.chain.iter().zip(chained) {
            if let Err(e) = result {
                warn!(config = %config, error = %e, "skipping chained configuration");
            }
        }

        for id in self.section_ids() {
            let config = self.section_config(id).to_string();
            let records = self.cfgsections(id);
            for option in self.sections[id.0].options_mut() {
                option.clear_stored();
                for record in &records {
                    let target = option.target(&config, record);
                    option.cache_stored(
                        record,
                        store.get(&target.config, &target.record, &target.attribute),
                    );
                }
            }
        }

        Ok(())
    }

    /// Creates a widget for every option of every governed record, then
    /// runs the dependency check.
    ///
    /// Widgets start from the stored value, or the option default when
    /// nothing is stored. Earlier widgets and their edits are discarded.
    #[instrument(skip(self), fields(config = %self.config))]
    pub fn render(&mut self) -> DependencyReport {
        self.widgets.clear();
        let readonly = self.readonly.unwrap_or(false);

        for id in self.section_ids() {
            let section = &self.sections[id.0];
            let records = section.cfgsections(self.store.as_ref(), section.config_or(&self.config));
            for record in &records {
                for option in section.options() {
                    let field = FieldContext {
                        section: id,
                        option,
                        record,
                        initial: option
                            .stored_value(record)
                            .cloned()
                            .or_else(|| option.default_for(record)),
                        readonly: readonly || option.is_readonly(),
                    };
                    let widget = self.factory.create(&field);
                    self.widgets
                        .insert(WidgetKey::new(id, option.name(), record.as_str()), widget);
                }
            }
        }
        debug!(fields = self.widgets.len(), "rendered");

        self.check_depends()
    }

    /// Discards widget edits by rendering again from the last load.
    pub fn reset(&mut self) -> DependencyReport {
        self.render()
    }

    /// Runs the save transaction.
    ///
    /// Checks dependencies, parses every option of every governed record,
    /// runs `pre_commit`, saves the store, then loads and renders again.
    /// Unless `silent`, a failure is also reported as an error event.
    ///
    /// Values written before a failing option are not rolled back.
    ///
    /// # Errors
    ///
    /// Returns the first parse error in declaration order, the hook's error,
    /// or the store's error.
    #[instrument(skip(self, pre_commit), fields(config = %self.config))]
    pub async fn save(
        &mut self,
        pre_commit: Option<PreCommit<'_>>,
        silent: bool,
    ) -> Result<DependencyReport, FormError> {
        self.check_depends();

        match self.commit(pre_commit).await {
            Ok(()) => Ok(self.render()),
            Err(e) => {
                if !silent {
                    error!(error = %e, "failed to save");
                }
                Err(e)
            }
        }
    }

    async fn commit(&mut self, pre_commit: Option<PreCommit<'_>>) -> Result<(), FormError> {
        self.parse()?;
        if let Some(hook) = pre_commit {
            hook(self.store.as_ref())?;
        }
        self.store.save().await?;
        self.load().await
    }

    /// Adds a record to a section, then saves silently.
    ///
    /// Typed sections add an anonymous record unless `name` is given; named
    /// sections always add their own record. Returns the record name.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnknownSection`] for an invalid id, or whatever
    /// the save fails with.
    pub async fn add_record(&mut self, id: SectionId, name: Option<&str>) -> Result<String, FormError> {
        let section = self
            .section(id)
            .ok_or_else(|| FormError::UnknownSection(id.to_string()))?;
        let name = match section.kind() {
            SectionKind::Named { name, .. } => Some(name.as_str()),
            SectionKind::Typed { .. } => name,
        };

        let added = self
            .store
            .add(self.section_config(id), section.section_type(), name);
        debug!(section = %id, record = %added, "added record");

        self.save(None, true).await?;
        Ok(added)
    }

    /// Removes a record governed by a section, then saves silently.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnknownSection`] for an invalid id, or whatever
    /// the save fails with.
    pub async fn remove_record(&mut self, id: SectionId, record: &str) -> Result<(), FormError> {
        if self.section(id).is_none() {
            return Err(FormError::UnknownSection(id.to_string()));
        }

        self.store.remove(self.section_config(id), record);
        debug!(section = %id, record, "removed record");

        self.save(None, true).await.map(|_| ())
    }

    /// Finds the rendered field a dependency path refers to.
    ///
    /// A local path names an option bound to `record` in `config` (the
    /// primary configuration when `None`); a dotted path names its own
    /// configuration and record.
    #[must_use]
    pub fn lookup_option(&self, path: &str, record: &str, config: Option<&str>) -> Option<WidgetKey> {
        self.resolve_path(
            &OptionPath::parse(path),
            record,
            config.unwrap_or(self.config.as_str()),
        )
    }

    pub(crate) fn resolve_path(&self, path: &OptionPath, record: &str, config: &str) -> Option<WidgetKey> {
        let (config, record, name) = match path {
            OptionPath::Local(name) => (config, record, name.as_str()),
            OptionPath::Global {
                config,
                record,
                option,
            } => (config.as_str(), record.as_str(), option.as_str()),
        };

        self.section_ids().find_map(|id| {
            let section = &self[id];
            let option = section.option_named(name)?;
            let option_config = option
                .config_override()
                .unwrap_or_else(|| section.config_or(&self.config));
            let key = WidgetKey::new(id, name, record);
            (option_config == config && self.widgets.contains(&key)).then_some(key)
        })
    }

    /// The rendered widget of a field.
    #[must_use]
    pub fn widget(&self, key: &WidgetKey) -> Option<&dyn Widget> {
        self.widgets.get(key)
    }

    /// The rendered widget of a field, mutably.
    pub fn widget_mut(&mut self, key: &WidgetKey) -> Option<&mut (dyn Widget + 'static)> {
        self.widgets.get_mut(key)
    }

    /// Whether a field is rendered and active.
    #[must_use]
    pub fn is_active(&self, key: &WidgetKey) -> bool {
        self.widgets.is_active(key)
    }

    /// The rendered fields.
    #[must_use]
    pub const fn widgets(&self) -> &WidgetRegistry {
        &self.widgets
    }
}

impl Index<SectionId> for Map {
    type Output = Section;

    fn index(&self, id: SectionId) -> &Self::Output {
        &self.sections[id.0]
    }
}

impl IndexMut<SectionId> for Map {
    fn index_mut(&mut self, id: SectionId) -> &mut Self::Output {
        &mut self.sections[id.0]
    }
}
