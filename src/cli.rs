use std::{fmt, path::PathBuf, str::FromStr};

mod add;
mod apply;
mod delete;
mod get;
mod list;
mod r#move;
mod set;
mod show;
mod terminal;

use cbi::{Config, FileStore, RecordStore};
use clap::ArgAction;
use futures::executor::block_on;
use tracing::instrument;

use terminal::Colorize;

/// A dotted `config[.record[.attribute]]` address.
///
/// The record part may be an `@type[index]` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    config: String,
    record: Option<String>,
    attribute: Option<String>,
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        let config = parts.next().unwrap_or_default();
        if config.is_empty() {
            return Err(format!("'{s}' does not name a configuration"));
        }

        let record = parts.next().map(str::to_string);
        let attribute = parts.next().map(str::to_string);
        if record.as_deref() == Some("") || attribute.as_deref() == Some("") {
            return Err(format!("'{s}' has an empty component"));
        }

        Ok(Self {
            config: config.to_string(),
            record,
            attribute,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.config)?;
        if let Some(record) = &self.record {
            write!(f, ".{record}")?;
        }
        if let Some(attribute) = &self.attribute {
            write!(f, ".{attribute}")?;
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global=true)]
    verbose: u8,

    /// The directory holding the configuration files
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::List(list::Command::default()))
            .run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// List the available configurations (default)
    List(list::Command),

    /// Show the records of one or all configurations
    Show(show::Command),

    /// Print the value of an attribute
    Get(get::Command),

    /// Assign an attribute
    Set(set::Command),

    /// Add a record
    Add(add::Command),

    /// Delete a record or an attribute
    Delete(delete::Command),

    /// Reorder a record
    Move(r#move::Command),

    /// Edit configurations through a form description
    ///
    /// The form's dependencies decide which values are kept: options that
    /// end up hidden are removed from the configuration.
    Apply(apply::Command),
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::List(command) => command.run(&root)?,
            Self::Show(command) => command.run(&root)?,
            Self::Get(command) => command.run(&root)?,
            Self::Set(command) => command.run(&root)?,
            Self::Add(command) => command.run(&root)?,
            Self::Delete(command) => command.run(&root)?,
            Self::Move(command) => command.run(&root)?,
            Self::Apply(command) => command.run(&root)?,
        }
        Ok(())
    }
}

/// Opens the file store under `root` with the settings found there.
fn open_store(root: &std::path::Path) -> (Config, FileStore) {
    let config = Config::load_or_default(root);
    let store = FileStore::new(root).with_extension(config.extension());
    (config, store)
}

/// Loads a configuration, resolving `@type[index]` selectors in the record
/// part of the address.
#[instrument(level = "debug", skip(store))]
fn load_address(store: &FileStore, address: &Address) -> anyhow::Result<Option<String>> {
    block_on(store.load(&address.config))?;

    match &address.record {
        None => Ok(None),
        Some(id) => store
            .resolve_record(&address.config, id)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("No record matches '{id}' in {}", address.config)),
    }
}

/// Saves the staged changes, or prints them when `dry_run` is set.
fn commit(store: &FileStore, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        print_changes(store);
        return Ok(());
    }

    let count = store.changes().len();
    block_on(store.save())?;
    tracing::info!("Saved {count} changes");
    Ok(())
}

fn print_changes(store: &FileStore) {
    let changes = store.changes();
    if changes.is_empty() {
        println!("{}", "No changes".dim());
    }
    for change in &changes {
        println!("{}", terminal::change_line(change));
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("network", None, None; "config only")]
    #[test_case("network.wan", Some("wan"), None; "record")]
    #[test_case("network.@interface[-1].proto", Some("@interface[-1]"), Some("proto"); "selector")]
    fn parses_addresses(input: &str, record: Option<&str>, attribute: Option<&str>) {
        let address: Address = input.parse().unwrap();
        assert_eq!(address.config, "network");
        assert_eq!(address.record.as_deref(), record);
        assert_eq!(address.attribute.as_deref(), attribute);
        assert_eq!(address.to_string(), input);
    }

    #[test_case(""; "empty")]
    #[test_case("network..proto"; "empty record")]
    fn rejects_addresses(input: &str) {
        assert!(input.parse::<Address>().is_err());
    }
}
