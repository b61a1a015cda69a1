use std::path::Path;

use cbi::RecordStore;
use tracing::instrument;

use super::{Address, load_address, open_store};

/// Prints the value of one attribute, or the type of a record.
#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The record or attribute to read
    address: Address,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (_, store) = open_store(root);

        let Some(record) = load_address(&store, &self.address)? else {
            anyhow::bail!("{} does not name a record", self.address);
        };

        match &self.address.attribute {
            None => {
                let record = store
                    .record(&self.address.config, &record)
                    .ok_or_else(|| anyhow::anyhow!("{} does not exist", self.address))?;
                println!("{}", record.section_type);
            }
            Some(attribute) => {
                let value = store
                    .get(&self.address.config, &record, attribute)
                    .ok_or_else(|| anyhow::anyhow!("{} is not set", self.address))?;
                println!("{value}");
            }
        }

        Ok(())
    }
}
