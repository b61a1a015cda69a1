use std::path::Path;

use cbi::{RecordStore, Value, storage::CONTROL_PREFIX};
use futures::executor::block_on;
use tracing::instrument;

use super::{Address, commit, load_address, open_store};

/// Assigns an attribute, or creates a named record.
///
/// `set network.lan.proto static` assigns an attribute;
/// `set network.lan interface` creates the record `lan` of type `interface`.
#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The attribute to assign, or the record to create
    address: Address,

    /// The value. Several values make a list.
    #[arg(required = true)]
    values: Vec<String>,

    /// Store a single value as a one-element list
    #[arg(long)]
    list: bool,

    /// Print the changes instead of saving them
    #[arg(long)]
    dry_run: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (_, store) = open_store(root);

        let Some(attribute) = &self.address.attribute else {
            return self.create_record(&store);
        };
        if attribute.starts_with(CONTROL_PREFIX) {
            anyhow::bail!("'{attribute}' is reserved for record metadata");
        }

        let Some(record) = load_address(&store, &self.address)? else {
            anyhow::bail!("{} does not name a record", self.address);
        };

        let value = if self.list || self.values.len() > 1 {
            Value::List(self.values)
        } else {
            Value::Text(self.values.concat())
        };
        store.set(&self.address.config, &record, attribute, Some(value));

        commit(&store, self.dry_run)
    }

    fn create_record(&self, store: &cbi::FileStore) -> anyhow::Result<()> {
        let Some(name) = &self.address.record else {
            anyhow::bail!("{} does not name a record", self.address);
        };
        let [section_type] = self.values.as_slice() else {
            anyhow::bail!("A record takes exactly one type");
        };

        store.create(&self.address.config)?;
        block_on(store.load(&self.address.config))?;
        store.add(&self.address.config, section_type, Some(name));

        commit(store, self.dry_run)
    }
}
