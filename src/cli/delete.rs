use std::path::Path;

use cbi::RecordStore;
use tracing::instrument;

use super::{Address, commit, load_address, open_store};

/// Deletes a record, or one attribute of a record.
#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The record or attribute to delete
    address: Address,

    /// Print the changes instead of saving them
    #[arg(long)]
    dry_run: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (_, store) = open_store(root);

        let Some(record) = load_address(&store, &self.address)? else {
            anyhow::bail!("Refusing to delete the whole of {}", self.address);
        };

        match &self.address.attribute {
            Some(attribute) => {
                if store.get(&self.address.config, &record, attribute).is_none() {
                    anyhow::bail!("{} is not set", self.address);
                }
                store.unset(&self.address.config, &record, attribute);
            }
            None => store.remove(&self.address.config, &record),
        }

        commit(&store, self.dry_run)
    }
}
