//! The records of one configuration namespace.
//!
//! A [`Package`] is the in-memory working set both store backends are built
//! on. It knows nothing about persistence; see
//! [`MemoryStore`](crate::storage::MemoryStore) and
//! [`FileStore`](crate::storage::FileStore).

use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;

use crate::storage::{
    natural::natural_cmp,
    record::{CONTROL_PREFIX, Record, Value},
};

/// Index assumed for records that carry no explicit index on load.
const UNINDEXED: usize = 9999;

static SELECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@([a-zA-Z0-9_-]+)\[(-?[0-9]+)\]$").expect("valid selector pattern"));

/// An ordered set of named records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    records: BTreeMap<String, Record>,
}

impl Package {
    /// Builds a package from loaded records.
    ///
    /// Records are sorted by their explicit index (records without one sort
    /// last), ties broken by natural comparison of the name, and then
    /// renumbered densely from zero. A later record with a duplicate name
    /// replaces the earlier one.
    #[must_use]
    pub fn from_loaded(records: impl IntoIterator<Item = (Record, Option<usize>)>) -> Self {
        let mut loaded: BTreeMap<String, (Record, usize)> = BTreeMap::new();
        for (record, index) in records {
            loaded.insert(record.name.clone(), (record, index.unwrap_or(UNINDEXED)));
        }

        let mut ordered: Vec<_> = loaded.into_values().collect();
        ordered.sort_by(|(a, ai), (b, bi)| ai.cmp(bi).then_with(|| natural_cmp(&a.name, &b.name)));

        let records = ordered
            .into_iter()
            .enumerate()
            .map(|(position, (mut record, _))| {
                record.index = position;
                (record.name.clone(), record)
            })
            .collect();

        Self { records }
    }

    /// Returns `true` if the package holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns a record by name.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }

    /// Returns the value of one attribute of a record.
    #[must_use]
    pub fn get(&self, name: &str, attribute: &str) -> Option<&Value> {
        self.records.get(name)?.get(attribute)
    }

    /// Assigns or, with `None`, deletes an attribute.
    ///
    /// Unknown records and attributes using the control prefix are ignored.
    /// Returns `true` if the record was modified.
    pub fn set(&mut self, name: &str, attribute: &str, value: Option<Value>) -> bool {
        if attribute.is_empty() || attribute.starts_with(CONTROL_PREFIX) {
            return false;
        }

        let Some(record) = self.records.get_mut(name) else {
            return false;
        };

        match value {
            Some(value) if record.attributes.get(attribute) == Some(&value) => false,
            Some(value) => {
                record.attributes.insert(attribute.to_string(), value);
                true
            }
            None => record.attributes.remove(attribute).is_some(),
        }
    }

    /// Returns records in index order, optionally restricted to one type.
    #[must_use]
    pub fn sections(&self, section_type: Option<&str>) -> Vec<&Record> {
        let mut records: Vec<_> = self
            .records
            .values()
            .filter(|record| section_type.is_none_or(|t| record.section_type == t))
            .collect();
        records.sort_by_key(|record| record.index);
        records
    }

    /// Adds a record and returns its name.
    ///
    /// Without a name, one is synthesized from the type and the number of
    /// records of that type (`interface0`, `interface1`, ...), skipping
    /// names that are already taken; such records are marked anonymous. If
    /// an explicit name already exists the package is left untouched and the
    /// name is returned.
    pub fn add(&mut self, section_type: &str, name: Option<&str>) -> String {
        let (name, anonymous) = match name {
            Some(name) if self.records.contains_key(name) => return name.to_string(),
            Some(name) => (name.to_string(), false),
            None => (self.synthesize_name(section_type), true),
        };

        let index = self
            .records
            .values()
            .map(|record| record.index + 1)
            .max()
            .unwrap_or(0);

        self.records.insert(
            name.clone(),
            Record::new(name.clone(), section_type, anonymous, index),
        );
        name
    }

    /// Removes a record, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Record> {
        self.records.remove(name)
    }

    /// Moves `name` directly before (or after) `anchor`, or to the end when
    /// there is no anchor. Indices are renumbered densely afterwards.
    ///
    /// Returns `false` if either record is unknown.
    pub fn move_record(&mut self, name: &str, anchor: Option<&str>, after: bool) -> bool {
        let mut order: Vec<String> = self
            .sections(None)
            .into_iter()
            .map(|record| record.name.clone())
            .collect();

        let Some(position) = order.iter().position(|n| n == name) else {
            return false;
        };
        let moving = order.remove(position);

        match anchor {
            None => order.push(moving),
            Some(anchor) => {
                let Some(target) = order.iter().position(|n| n == anchor) else {
                    return false;
                };
                order.insert(target + usize::from(after), moving);
            }
        }

        for (index, name) in order.iter().enumerate() {
            if let Some(record) = self.records.get_mut(name) {
                record.index = index;
            }
        }

        true
    }

    /// Resolves a record id, accepting the `@type[index]` selector syntax.
    ///
    /// Negative indices count from the end. Plain names are returned as-is,
    /// whether or not they exist.
    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<String> {
        let Some(captures) = SELECTOR.captures(id) else {
            return Some(id.to_string());
        };

        let records = self.sections(Some(&captures[1]));
        let position: isize = captures[2].parse().ok()?;
        let position = if position < 0 {
            records.len().checked_sub(position.unsigned_abs())?
        } else {
            position.unsigned_abs()
        };

        records.get(position).map(|record| record.name.clone())
    }

    /// Iterates over all records in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.sections(None).into_iter()
    }

    fn synthesize_name(&self, section_type: &str) -> String {
        let count = self
            .records
            .values()
            .filter(|record| record.section_type == section_type)
            .count();

        let mut n = count;
        loop {
            let candidate = format!("{section_type}{n}");
            if !self.records.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
