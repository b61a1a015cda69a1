//! An in-memory record store.

use std::{cell::RefCell, collections::BTreeMap};

use async_trait::async_trait;

use crate::storage::{
    Document, RecordStore, StoreError,
    package::Package,
    record::{Record, Value},
};

/// A record store that lives entirely in memory.
///
/// Loading and saving always succeed and do nothing. Operations on a
/// configuration that was never populated behave as on an empty one; adding
/// a record creates it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    packages: RefCell<BTreeMap<String, Package>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one configuration built from a document.
    #[must_use]
    pub fn from_document(config: impl Into<String>, document: Document) -> Self {
        let store = Self::new();
        store.insert(config, document.into_package());
        store
    }

    /// Replaces the records of a configuration.
    pub fn insert(&self, config: impl Into<String>, package: Package) {
        self.packages.borrow_mut().insert(config.into(), package);
    }

    /// Returns a copy of the records of a configuration.
    #[must_use]
    pub fn package(&self, config: &str) -> Option<Package> {
        self.packages.borrow().get(config).cloned()
    }
}

#[async_trait(?Send)]
impl RecordStore for MemoryStore {
    async fn load(&self, _config: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn record(&self, config: &str, name: &str) -> Option<Record> {
        self.packages.borrow().get(config)?.record(name).cloned()
    }

    fn get(&self, config: &str, record: &str, attribute: &str) -> Option<Value> {
        self.packages
            .borrow()
            .get(config)?
            .get(record, attribute)
            .cloned()
    }

    fn set(&self, config: &str, record: &str, attribute: &str, value: Option<Value>) {
        if let Some(package) = self.packages.borrow_mut().get_mut(config) {
            package.set(record, attribute, value);
        }
    }

    fn sections(&self, config: &str, section_type: Option<&str>) -> Vec<Record> {
        self.packages
            .borrow()
            .get(config)
            .map(|package| package.sections(section_type).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    fn add(&self, config: &str, section_type: &str, name: Option<&str>) -> String {
        self.packages
            .borrow_mut()
            .entry(config.to_string())
            .or_default()
            .add(section_type, name)
    }

    fn remove(&self, config: &str, record: &str) {
        if let Some(package) = self.packages.borrow_mut().get_mut(config) {
            package.remove(record);
        }
    }

    fn move_record(&self, config: &str, record: &str, anchor: Option<&str>, after: bool) -> bool {
        self.packages
            .borrow_mut()
            .get_mut(config)
            .is_some_and(|package| package.move_record(record, anchor, after))
    }

    fn resolve_record(&self, config: &str, id: &str) -> Option<String> {
        match self.packages.borrow().get(config) {
            Some(package) => package.resolve(id),
            None => Some(id.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn add_on_empty_store() {
        let store = MemoryStore::new();

        let name = store.add("network", "interface", None);

        let record = store.record("network", &name).unwrap();
        assert_eq!(name, "interface0");
        assert_eq!(record.index, 0);
        assert!(record.anonymous);
    }

    #[test]
    fn scalar_and_list_round_trip() {
        let store = MemoryStore::new();
        store.add("network", "interface", Some("wan"));

        store.set("network", "wan", "proto", Some(Value::from("static")));
        assert_eq!(
            store.get("network", "wan", "proto"),
            Some(Value::from("static"))
        );

        let dns = Value::from(vec!["1.1.1.1", "9.9.9.9"]);
        store.set("network", "wan", "dns", Some(dns.clone()));
        assert_eq!(store.get("network", "wan", "dns"), Some(dns));

        store.unset("network", "wan", "dns");
        assert_eq!(store.get("network", "wan", "dns"), None);
    }

    #[test]
    fn unknown_configs_and_records_are_ignored() {
        let store = MemoryStore::new();

        store.set("network", "wan", "proto", Some(Value::from("static")));
        store.remove("network", "wan");

        assert_eq!(store.get("network", "wan", "proto"), None);
        assert!(store.sections("network", None).is_empty());
        assert!(!store.move_record("network", "wan", None, false));
    }

    #[test]
    fn first_of_type_helpers() {
        let store = MemoryStore::new();
        store.add("system", "system", None);
        store.add("system", "system", None);

        store.set_first("system", "system", "hostname", Some(Value::from("OpenWrt")));

        assert_eq!(
            store.get("system", "system0", "hostname"),
            Some(Value::from("OpenWrt"))
        );
        assert_eq!(store.get("system", "system1", "hostname"), None);
        assert_eq!(
            store.get_first("system", "system", "hostname"),
            Some(Value::from("OpenWrt"))
        );

        store.unset_first("system", "system", "hostname");
        assert_eq!(store.get_first("system", "system", "hostname"), None);
    }

    #[test]
    fn load_and_save_always_succeed() {
        let store = MemoryStore::new();
        block_on(store.load("anything")).unwrap();
        block_on(store.save()).unwrap();
        assert!(block_on(store.can_write("anything")));
    }
}
