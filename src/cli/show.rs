use std::path::Path;

use cbi::{Record, RecordStore};
use futures::executor::block_on;
use tracing::instrument;

use super::{Address, load_address, open_store};

/// Prints records as `config.record=type` and `config.record.attribute='value'`
/// lines.
#[derive(Debug, clap::Parser)]
pub struct Command {
    /// What to show: a configuration, a record or one attribute. Shows
    /// every configuration when omitted.
    address: Option<Address>,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (_, store) = open_store(root);

        let Some(address) = self.address else {
            for config in store.configs() {
                block_on(store.load(&config))?;
                for record in store.sections(&config, None) {
                    print_record(&config, &record);
                }
            }
            return Ok(());
        };

        let record = load_address(&store, &address)?;
        match (record, &address.attribute) {
            (None, _) => {
                for record in store.sections(&address.config, None) {
                    print_record(&address.config, &record);
                }
            }
            (Some(name), None) => {
                if let Some(record) = store.record(&address.config, &name) {
                    print_record(&address.config, &record);
                }
            }
            (Some(name), Some(attribute)) => {
                let value = store
                    .get(&address.config, &name, attribute)
                    .ok_or_else(|| anyhow::anyhow!("{address} is not set"))?;
                println!("{}.{name}.{attribute}='{value}'", address.config);
            }
        }

        Ok(())
    }
}

fn print_record(config: &str, record: &Record) {
    println!("{config}.{}={}", record.name, record.section_type);
    for (attribute, value) in &record.attributes {
        println!("{config}.{}.{attribute}='{value}'", record.name);
    }
}
