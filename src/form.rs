//! The form engine.
//!
//! A [`Map`] binds a set of [`Section`]s to a [`RecordStore`]. Each section
//! governs some records (every record of a type, or one named record) and
//! owns [`FormOption`]s, each binding one attribute of every governed record
//! to a field. Fields are created through a [`WidgetFactory`] when the map
//! renders.
//!
//! The lifecycle is:
//!
//! 1. [`Map::load`] refreshes the store and caches each option's stored
//!    value.
//! 2. [`Map::render`] creates the fields and runs [`Map::check_depends`],
//!    which shows or hides fields until their dependencies settle.
//! 3. [`Map::save`] checks dependencies again, parses every field (validate,
//!    then write or remove), saves the store, and loads and renders again.
//!
//! [`RecordStore`]: crate::storage::RecordStore

pub mod blueprint;
pub mod depends;
mod error;
mod evaluate;
pub mod graph;
mod map;
mod option;
mod parse;
mod section;
pub mod widget;

pub use blueprint::Blueprint;
pub use depends::{DependencyGroup, Expected, OptionPath};
pub use error::FormError;
pub use evaluate::DependencyReport;
pub use map::{DEFAULT_PASS_LIMIT, Map, PreCommit, SectionId};
pub use option::{FormOption, OptionKind, Target, Validator};
pub use section::{Filter, Section, SectionKind, Tab};
pub use widget::{FieldContext, MemoryWidget, MemoryWidgetFactory, Widget, WidgetFactory, WidgetKey, WidgetRegistry};
