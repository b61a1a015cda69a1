use std::path::Path;

use cbi::RecordStore;
use futures::executor::block_on;
use tracing::instrument;

use super::{commit, open_store};

/// Adds a record and prints its name.
///
/// Without a name the record is anonymous and gets a generated one.
#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The configuration to add to. Created if missing.
    config: String,

    /// The record type
    section_type: String,

    /// The record name
    name: Option<String>,

    /// Print the changes instead of saving them
    #[arg(long)]
    dry_run: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (_, store) = open_store(root);

        store.create(&self.config)?;
        block_on(store.load(&self.config))?;

        let name = store.add(&self.config, &self.section_type, self.name.as_deref());
        println!("{name}");

        commit(&store, self.dry_run)
    }
}
