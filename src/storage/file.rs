//! A filesystem backed record store with staged changes.
//!
//! Each configuration is one [`Document`] in the store's directory
//! (`<root>/network.toml`), stored in the [`Format`] named by the store's
//! file extension. Loaded configurations are kept twice: the
//! committed copy as read from disk and a working copy that receives every
//! mutation. [`FileStore::changes`] reports the difference between the two
//! and [`RecordStore::save`] writes the working copy of every modified
//! configuration back to disk.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tracing::instrument;

use crate::storage::{
    Document, Format, RecordStore, StoreError,
    package::Package,
    record::{Record, Value},
};

/// A staged, unsaved modification of a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A record was added.
    Add {
        /// The configuration name.
        config: String,
        /// The record name.
        record: String,
        /// The record type.
        section_type: String,
    },
    /// A record was removed.
    Remove {
        /// The configuration name.
        config: String,
        /// The record name.
        record: String,
    },
    /// An attribute was assigned.
    Set {
        /// The configuration name.
        config: String,
        /// The record name.
        record: String,
        /// The attribute name.
        attribute: String,
        /// The new value.
        value: Value,
    },
    /// An attribute was deleted.
    Unset {
        /// The configuration name.
        config: String,
        /// The record name.
        record: String,
        /// The attribute name.
        attribute: String,
    },
    /// Records of a configuration were reordered.
    Reorder {
        /// The configuration name.
        config: String,
        /// The new record order.
        order: Vec<String>,
    },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add {
                config,
                record,
                section_type,
            } => write!(f, "+ {config}.{record}={section_type}"),
            Self::Remove { config, record } => write!(f, "- {config}.{record}"),
            Self::Set {
                config,
                record,
                attribute,
                value,
            } => write!(f, "  {config}.{record}.{attribute}='{value}'"),
            Self::Unset {
                config,
                record,
                attribute,
            } => write!(f, "- {config}.{record}.{attribute}"),
            Self::Reorder { config, order } => write!(f, "~ {config}: {}", order.join(" ")),
        }
    }
}

#[derive(Debug, Clone)]
struct Loaded {
    committed: Package,
    working: Package,
}

/// A record store backed by a directory of documents.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    extension: String,
    loaded: RefCell<BTreeMap<String, Loaded>>,
}

impl FileStore {
    /// Opens a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "toml".to_string(),
            loaded: RefCell::new(BTreeMap::new()),
        }
    }

    /// Sets the file extension of configuration documents.
    ///
    /// `json`, `yaml` and `yml` documents are read and written in that
    /// format; any other extension holds TOML.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// The directory holding the configuration documents.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path of the document backing a configuration.
    #[must_use]
    pub fn path(&self, config: &str) -> PathBuf {
        self.root.join(format!("{config}.{}", self.extension))
    }

    /// Lists the configurations available in the store's directory.
    #[must_use]
    pub fn configs(&self) -> Vec<String> {
        let mut configs: Vec<String> = walkdir::WalkDir::new(&self.root)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry.path().extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
            })
            .filter_map(|entry| {
                entry
                    .path()
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        configs.sort();
        configs
    }

    /// Creates an empty configuration document if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the document cannot be written.
    pub fn create(&self, config: &str) -> Result<(), StoreError> {
        let path = self.path(config);
        if path.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;
        std::fs::write(&path, "").map_err(|source| StoreError::Io { path, source })
    }

    /// Drops a configuration from memory, discarding staged changes.
    pub fn unload(&self, config: &str) {
        self.loaded.borrow_mut().remove(config);
    }

    /// Discards the staged changes of a configuration.
    pub fn revert(&self, config: &str) {
        if let Some(loaded) = self.loaded.borrow_mut().get_mut(config) {
            loaded.working = loaded.committed.clone();
        }
    }

    /// Lists the staged changes of every loaded configuration.
    #[must_use]
    pub fn changes(&self) -> Vec<Change> {
        self.loaded
            .borrow()
            .iter()
            .flat_map(|(config, loaded)| diff(config, &loaded.committed, &loaded.working))
            .collect()
    }

    fn format(&self) -> Format {
        Format::from_extension(&self.extension)
    }

    fn read(&self, config: &str) -> Result<Package, StoreError> {
        let path = self.path(config);
        let text = std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(config.to_string()),
            _ => StoreError::Io {
                path: path.clone(),
                source,
            },
        })?;

        let document = Document::parse(&text, self.format()).map_err(|e| StoreError::Parse {
            path,
            message: e.to_string(),
        })?;

        Ok(document.into_package())
    }

    fn write(&self, config: &str, package: &Package) -> Result<(), StoreError> {
        let path = self.path(config);
        let text = Document::from_package(package).render(self.format())?;
        std::fs::write(&path, text).map_err(|source| StoreError::Io { path, source })
    }

    fn with_working<T>(&self, config: &str, f: impl FnOnce(&mut Package) -> T) -> Option<T> {
        self.loaded
            .borrow_mut()
            .get_mut(config)
            .map(|loaded| f(&mut loaded.working))
    }
}

#[async_trait(?Send)]
impl RecordStore for FileStore {
    /// Reads a configuration from disk unless it is already loaded.
    #[instrument(level = "debug", skip(self))]
    async fn load(&self, config: &str) -> Result<(), StoreError> {
        if self.loaded.borrow().contains_key(config) {
            return Ok(());
        }

        let package = self.read(config)?;
        tracing::debug!("Loaded {} records from {}", package.iter().count(), config);

        self.loaded.borrow_mut().insert(
            config.to_string(),
            Loaded {
                committed: package.clone(),
                working: package,
            },
        );
        Ok(())
    }

    /// Writes every modified configuration, then re-reads it from disk.
    #[instrument(level = "debug", skip(self))]
    async fn save(&self) -> Result<(), StoreError> {
        let dirty: Vec<(String, Package)> = self
            .loaded
            .borrow()
            .iter()
            .filter(|(_, loaded)| loaded.committed != loaded.working)
            .map(|(config, loaded)| (config.clone(), loaded.working.clone()))
            .collect();

        for (config, package) in &dirty {
            self.write(config, package)?;
            tracing::info!("Saved configuration {config}");

            let reloaded = self.read(config)?;
            self.loaded.borrow_mut().insert(
                config.clone(),
                Loaded {
                    committed: reloaded.clone(),
                    working: reloaded,
                },
            );
        }

        Ok(())
    }

    async fn can_write(&self, config: &str) -> bool {
        let path = self.path(config);
        match std::fs::metadata(&path) {
            Ok(metadata) => !metadata.permissions().readonly(),
            Err(_) => std::fs::metadata(&self.root)
                .is_ok_and(|metadata| !metadata.permissions().readonly()),
        }
    }

    fn record(&self, config: &str, name: &str) -> Option<Record> {
        self.loaded
            .borrow()
            .get(config)?
            .working
            .record(name)
            .cloned()
    }

    fn get(&self, config: &str, record: &str, attribute: &str) -> Option<Value> {
        self.loaded
            .borrow()
            .get(config)?
            .working
            .get(record, attribute)
            .cloned()
    }

    fn set(&self, config: &str, record: &str, attribute: &str, value: Option<Value>) {
        self.with_working(config, |package| package.set(record, attribute, value));
    }

    fn sections(&self, config: &str, section_type: Option<&str>) -> Vec<Record> {
        self.loaded
            .borrow()
            .get(config)
            .map(|loaded| {
                loaded
                    .working
                    .sections(section_type)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Adding to a configuration that is not loaded does nothing; the would-be
    /// name is still returned.
    fn add(&self, config: &str, section_type: &str, name: Option<&str>) -> String {
        self.with_working(config, |package| package.add(section_type, name))
            .unwrap_or_else(|| name.map_or_else(|| format!("{section_type}0"), str::to_string))
    }

    fn remove(&self, config: &str, record: &str) {
        self.with_working(config, |package| package.remove(record));
    }

    fn move_record(&self, config: &str, record: &str, anchor: Option<&str>, after: bool) -> bool {
        self.with_working(config, |package| package.move_record(record, anchor, after))
            .unwrap_or(false)
    }

    fn resolve_record(&self, config: &str, id: &str) -> Option<String> {
        match self.loaded.borrow().get(config) {
            Some(loaded) => loaded.working.resolve(id),
            None => Some(id.to_string()),
        }
    }
}

fn diff(config: &str, committed: &Package, working: &Package) -> Vec<Change> {
    let mut changes = Vec::new();

    for record in committed.iter() {
        if working.record(&record.name).is_none() {
            changes.push(Change::Remove {
                config: config.to_string(),
                record: record.name.clone(),
            });
        }
    }

    for record in working.iter() {
        let before = committed.record(&record.name);

        if before.is_none() {
            changes.push(Change::Add {
                config: config.to_string(),
                record: record.name.clone(),
                section_type: record.section_type.clone(),
            });
        }

        for (attribute, value) in &record.attributes {
            if before.and_then(|b| b.get(attribute)) != Some(value) {
                changes.push(Change::Set {
                    config: config.to_string(),
                    record: record.name.clone(),
                    attribute: attribute.clone(),
                    value: value.clone(),
                });
            }
        }

        if let Some(before) = before {
            for attribute in before.attributes.keys() {
                if !record.attributes.contains_key(attribute) {
                    changes.push(Change::Unset {
                        config: config.to_string(),
                        record: record.name.clone(),
                        attribute: attribute.clone(),
                    });
                }
            }
        }
    }

    let surviving = |package: &Package| -> Vec<String> {
        package
            .iter()
            .filter(|record| committed.record(&record.name).is_some())
            .filter(|record| working.record(&record.name).is_some())
            .map(|record| record.name.clone())
            .collect()
    };
    let order = surviving(working);
    if surviving(committed) != order {
        changes.push(Change::Reorder {
            config: config.to_string(),
            order,
        });
    }

    changes
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use tempfile::TempDir;

    use super::*;

    const NETWORK: &str = r#"
[[record]]
".type" = "interface"
".name" = "lan"
proto = "static"
ipaddr = "192.168.1.1"

[[record]]
".type" = "interface"
".name" = "wan"
proto = "dhcp"
"#;

    fn store() -> (TempDir, FileStore) {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("network.toml"), NETWORK).unwrap();
        let store = FileStore::new(tmp.path());
        (tmp, store)
    }

    #[test]
    fn load_missing_config_fails() {
        let (_tmp, store) = store();

        let error = block_on(store.load("wireless")).unwrap_err();
        assert!(matches!(error, StoreError::NotFound(config) if config == "wireless"));
    }

    #[test]
    fn load_invalid_document_fails() {
        let (tmp, store) = store();
        std::fs::write(tmp.path().join("broken.toml"), "record = 3").unwrap();

        let error = block_on(store.load("broken")).unwrap_err();
        assert!(matches!(error, StoreError::Parse { .. }));
    }

    #[test]
    fn mutations_are_staged_until_save() {
        let (tmp, store) = store();
        block_on(store.load("network")).unwrap();

        store.set("network", "wan", "proto", Some(Value::from("pppoe")));
        store.unset("network", "lan", "ipaddr");
        let added = store.add("network", "interface", None);

        assert_eq!(added, "interface2");
        assert_eq!(
            store.changes(),
            vec![
                Change::Unset {
                    config: "network".into(),
                    record: "lan".into(),
                    attribute: "ipaddr".into(),
                },
                Change::Set {
                    config: "network".into(),
                    record: "wan".into(),
                    attribute: "proto".into(),
                    value: Value::from("pppoe"),
                },
                Change::Add {
                    config: "network".into(),
                    record: "interface2".into(),
                    section_type: "interface".into(),
                },
            ]
        );

        let on_disk = std::fs::read_to_string(tmp.path().join("network.toml")).unwrap();
        assert_eq!(on_disk, NETWORK);

        block_on(store.save()).unwrap();
        assert!(store.changes().is_empty());

        let fresh = FileStore::new(tmp.path());
        block_on(fresh.load("network")).unwrap();
        assert_eq!(
            fresh.get("network", "wan", "proto"),
            Some(Value::from("pppoe"))
        );
        assert_eq!(fresh.get("network", "lan", "ipaddr"), None);
        let anonymous = fresh.record("network", "interface2").unwrap();
        assert!(anonymous.anonymous);
        assert_eq!(anonymous.index, 2);
    }

    #[test]
    fn reorder_and_remove_are_reported() {
        let (_tmp, store) = store();
        block_on(store.load("network")).unwrap();

        store.add("network", "interface", Some("guest"));
        assert!(store.move_record("network", "guest", Some("lan"), false));
        assert!(store.move_record("network", "wan", Some("lan"), false));
        store.remove("network", "lan");

        let changes = store.changes();
        assert!(changes.contains(&Change::Remove {
            config: "network".into(),
            record: "lan".into(),
        }));
        assert!(!changes.iter().any(|c| matches!(c, Change::Reorder { .. })));

        store.revert("network");
        assert!(store.changes().is_empty());

        assert!(store.move_record("network", "wan", Some("lan"), false));
        assert_eq!(
            store.changes(),
            vec![Change::Reorder {
                config: "network".into(),
                order: vec!["wan".into(), "lan".into()],
            }]
        );
    }

    #[test]
    fn load_keeps_staged_changes() {
        let (_tmp, store) = store();
        block_on(store.load("network")).unwrap();
        store.set("network", "wan", "proto", Some(Value::from("pppoe")));

        block_on(store.load("network")).unwrap();
        assert_eq!(
            store.get("network", "wan", "proto"),
            Some(Value::from("pppoe"))
        );

        store.unload("network");
        block_on(store.load("network")).unwrap();
        assert_eq!(
            store.get("network", "wan", "proto"),
            Some(Value::from("dhcp"))
        );
    }

    #[test]
    fn lists_and_creates_configs() {
        let (tmp, store) = store();
        std::fs::write(tmp.path().join("notes.txt"), "").unwrap();

        store.create("firewall").unwrap();

        assert_eq!(store.configs(), vec!["firewall", "network"]);
        block_on(store.load("firewall")).unwrap();
        assert!(store.sections("firewall", None).is_empty());
    }

    #[test]
    fn resolves_selectors_in_working_copy() {
        let (_tmp, store) = store();
        block_on(store.load("network")).unwrap();

        assert_eq!(
            store.resolve_record("network", "@interface[-1]").as_deref(),
            Some("wan")
        );
    }

    #[test]
    fn json_stores_write_json() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("network.json"),
            r#"{ "interface": [ { ".name": "wan", "proto": "dhcp" } ] }"#,
        )
        .unwrap();
        let store = FileStore::new(tmp.path()).with_extension("json");
        block_on(store.load("network")).unwrap();

        store.set("network", "wan", "proto", Some(Value::from("static")));
        block_on(store.save()).unwrap();

        let on_disk = std::fs::read_to_string(tmp.path().join("network.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&on_disk).unwrap();
        assert_eq!(json["record"][0]["proto"], "static");

        let fresh = FileStore::new(tmp.path()).with_extension("json");
        block_on(fresh.load("network")).unwrap();
        assert_eq!(fresh.get("network", "wan", "proto"), Some(Value::from("static")));
    }
}
