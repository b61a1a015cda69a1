use std::path::Path;

use cbi::RecordStore;
use futures::executor::block_on;
use tracing::instrument;

use super::{open_store, terminal::Colorize};

/// Lists the configurations found under the root.
#[derive(Debug, Default, clap::Parser)]
pub struct Command {
    /// Also print how many records each configuration holds
    #[arg(short, long)]
    count: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (_, store) = open_store(root);
        let configs = store.configs();

        if configs.is_empty() {
            println!("{}", format!("No configurations in {}", root.display()).dim());
            return Ok(());
        }

        for config in configs {
            if !self.count {
                println!("{config}");
                continue;
            }

            match block_on(store.load(&config)) {
                Ok(()) => {
                    let records = store.sections(&config, None).len();
                    println!("{config} {}", format!("({records} records)").dim());
                }
                Err(e) => {
                    tracing::warn!("Skipping {config}: {e}");
                    println!("{config} {}", "(unreadable)".warning());
                }
            }
        }

        Ok(())
    }
}
