use std::path::Path;

use cbi::RecordStore;
use tracing::instrument;

use super::{Address, commit, load_address, open_store};

/// Moves a record before or after another one, or to the end.
#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The record to move
    address: Address,

    /// Place the record directly before this one
    #[arg(long, conflicts_with = "after")]
    before: Option<String>,

    /// Place the record directly after this one
    #[arg(long)]
    after: Option<String>,

    /// Print the changes instead of saving them
    #[arg(long)]
    dry_run: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (_, store) = open_store(root);

        if self.address.attribute.is_some() {
            anyhow::bail!("{} names an attribute, not a record", self.address);
        }
        let Some(record) = load_address(&store, &self.address)? else {
            anyhow::bail!("{} does not name a record", self.address);
        };

        let config = &self.address.config;
        let (anchor, after) = match (&self.before, &self.after) {
            (Some(anchor), _) => (Some(anchor), false),
            (None, Some(anchor)) => (Some(anchor), true),
            (None, None) => (None, false),
        };
        let anchor = anchor
            .map(|id| {
                store
                    .resolve_record(config, id)
                    .ok_or_else(|| anyhow::anyhow!("No record matches '{id}' in {config}"))
            })
            .transpose()?;

        if !store.move_record(config, &record, anchor.as_deref(), after) {
            anyhow::bail!("Failed to move {record}");
        }

        commit(&store, self.dry_run)
    }
}
