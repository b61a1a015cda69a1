//! Record stores.
//!
//! A record store holds the configuration records a form is bound to. It is
//! addressed by a store identifier (the configuration name, e.g. `network`),
//! then by record name and attribute. Two backends are provided:
//!
//! - [`MemoryStore`]: records held in memory, loading and saving are no-ops.
//! - [`FileStore`]: one [`Document`] per configuration in a directory, in
//!   the [`Format`] its file extension names, with staged changes that are
//!   only written out by `save`.

use std::path::PathBuf;

use async_trait::async_trait;

pub mod document;
mod file;
mod memory;
mod natural;
mod package;
mod record;

pub use document::{Document, Format};
pub use file::{Change, FileStore};
pub use memory::MemoryStore;
pub use natural::natural_cmp;
pub use package::Package;
pub use record::{CONTROL_PREFIX, Record, Value};

/// Errors raised by store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The configuration does not exist in the backend.
    #[error("configuration '{0}' not found")]
    NotFound(String),

    /// Reading or writing a backing file failed.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A backing file could not be parsed.
    #[error("failed to parse {}: {message}", path.display())]
    Parse {
        /// The file being parsed.
        path: PathBuf,
        /// The parser's message.
        message: String,
    },

    /// A document could not be parsed.
    #[error("invalid document: {0}")]
    Document(String),

    /// Records could not be serialized.
    #[error("failed to serialize records: {0}")]
    Serialize(String),
}

/// The record store contract.
///
/// Mutations are synchronous and take `&self`: a store is shared by every
/// element of a form, and all access happens on a single thread. Only
/// [`load`](Self::load), [`save`](Self::save) and
/// [`can_write`](Self::can_write) suspend.
#[async_trait(?Send)]
pub trait RecordStore {
    /// Refreshes the in-memory state of one configuration from the backend.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot provide the
    /// configuration.
    async fn load(&self, config: &str) -> Result<(), StoreError>;

    /// Persists all pending changes.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be written.
    async fn save(&self) -> Result<(), StoreError>;

    /// Probes whether the caller may write to a configuration.
    async fn can_write(&self, _config: &str) -> bool {
        true
    }

    /// Returns a whole record.
    fn record(&self, config: &str, name: &str) -> Option<Record>;

    /// Returns one attribute of a record, or `None` if either is absent.
    fn get(&self, config: &str, record: &str, attribute: &str) -> Option<Value>;

    /// Assigns an attribute, or deletes it when `value` is `None`.
    ///
    /// Does nothing if the record does not exist or the attribute starts
    /// with [`CONTROL_PREFIX`].
    fn set(&self, config: &str, record: &str, attribute: &str, value: Option<Value>);

    /// Deletes an attribute.
    fn unset(&self, config: &str, record: &str, attribute: &str) {
        self.set(config, record, attribute, None);
    }

    /// Returns the records of a configuration in index order, optionally
    /// restricted to one type.
    fn sections(&self, config: &str, section_type: Option<&str>) -> Vec<Record>;

    /// Adds a record and returns its name.
    ///
    /// Without a name one is synthesized and the record is marked anonymous.
    /// Adding an existing name changes nothing and returns that name.
    fn add(&self, config: &str, section_type: &str, name: Option<&str>) -> String;

    /// Deletes a record. Nothing referring to it is touched.
    fn remove(&self, config: &str, record: &str);

    /// Places `record` directly before `anchor`, or after it if `after` is
    /// set, or at the end when there is no anchor.
    ///
    /// Returns `false` if either record is unknown.
    fn move_record(&self, config: &str, record: &str, anchor: Option<&str>, after: bool) -> bool;

    /// Resolves a record id, including `@type[index]` selectors.
    fn resolve_record(&self, config: &str, id: &str) -> Option<String>;

    /// Returns an attribute of the first record of a type.
    fn get_first(&self, config: &str, section_type: &str, attribute: &str) -> Option<Value> {
        let first = self.sections(config, Some(section_type)).into_iter().next()?;
        first.get(attribute).cloned()
    }

    /// Assigns an attribute of the first record of a type.
    fn set_first(&self, config: &str, section_type: &str, attribute: &str, value: Option<Value>) {
        if let Some(first) = self.sections(config, Some(section_type)).into_iter().next() {
            self.set(config, &first.name, attribute, value);
        }
    }

    /// Deletes an attribute of the first record of a type.
    fn unset_first(&self, config: &str, section_type: &str, attribute: &str) {
        self.set_first(config, section_type, attribute, None);
    }
}
