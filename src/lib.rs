//! Configuration binding engine
//!
//! Binds form fields to records in a pluggable record store, evaluates
//! cross-field visibility dependencies, and runs the transactional
//! read-validate-write-reload cycle of a configuration form.

mod config;
pub use config::{CONFIG_DIR, Config};

/// Forms: maps, sections, options, dependencies and the save transaction.
pub mod form;
pub use form::{Blueprint, DependencyGroup, FormError, FormOption, Map, OptionKind, Section, SectionId};

/// Record stores and their persisted format.
pub mod storage;
pub use storage::{Document, FileStore, MemoryStore, Record, RecordStore, StoreError, Value};
