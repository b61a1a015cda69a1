use std::{path::{Path, PathBuf}, rc::Rc, str::FromStr};

use cbi::{
    Blueprint, FormError, Map, OptionKind, RecordStore, Value,
    form::{DependencyReport, WidgetKey},
};
use futures::executor::block_on;
use tracing::instrument;

use super::{open_store, print_changes, terminal::Colorize};

/// One `record.option=value` edit. An empty value clears the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    record: String,
    option: String,
    value: String,
}

impl FromStr for Assignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once('=')
            .ok_or_else(|| format!("'{s}' is not of the form record.option=value"))?;
        let (record, option) = field
            .split_once('.')
            .filter(|(record, option)| !record.is_empty() && !option.is_empty())
            .ok_or_else(|| format!("'{field}' is not of the form record.option"))?;

        Ok(Self {
            record: record.to_string(),
            option: option.to_string(),
            value: value.to_string(),
        })
    }
}

/// Loads a form description, edits its fields and saves the result.
///
/// Dependencies are evaluated after the edits, so options whose
/// dependencies no longer hold are removed from the configuration.
#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The form description (TOML)
    blueprint: PathBuf,

    /// Field edits as record.option=value
    #[arg(short, long = "set", value_name = "ASSIGNMENT")]
    assignments: Vec<Assignment>,

    /// Print the changes instead of saving them
    #[arg(long)]
    dry_run: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (config, store) = open_store(root);
        let store = Rc::new(store);

        let blueprint = Blueprint::load(&self.blueprint)?;
        let mut map = blueprint
            .build(Rc::clone(&store) as Rc<dyn RecordStore>)?
            .with_pass_limit(config.dependency_pass_limit());
        if let (None, Some(readonly)) = (blueprint.readonly, config.readonly) {
            map.set_readonly(readonly);
        }

        block_on(map.load())?;
        report(&map.render());

        if map.readonly() == Some(true) && !self.assignments.is_empty() {
            anyhow::bail!("{} is read-only", map.config());
        }
        for assignment in &self.assignments {
            edit(&mut map, assignment)?;
        }

        if self.dry_run {
            report(&map.check_depends());
            let parsed = map.parse();
            print_changes(&store);
            for config in std::iter::once(&blueprint.config).chain(&blueprint.chain) {
                store.revert(config);
            }
            return parsed.map_err(Into::into);
        }

        let printer = Rc::clone(&store);
        let mut hook = |_: &dyn RecordStore| -> Result<(), FormError> {
            print_changes(&printer);
            Ok(())
        };
        let saved = block_on(map.save(Some(&mut hook), false))?;
        report(&saved);

        Ok(())
    }
}

fn edit(map: &mut Map, assignment: &Assignment) -> anyhow::Result<()> {
    let record = map
        .store()
        .resolve_record(map.config(), &assignment.record)
        .unwrap_or_else(|| assignment.record.clone());

    let key: WidgetKey = map
        .lookup_option(&assignment.option, &record, None)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No field {}.{} in {}",
                assignment.record,
                assignment.option,
                map.config()
            )
        })?;

    let value = match map[key.section].option_named(&key.option).map(|o| o.kind()) {
        _ if assignment.value.is_empty() => None,
        Some(OptionKind::DynamicList) => Some(Value::List(
            assignment
                .value
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        )),
        _ => Some(Value::Text(assignment.value.clone())),
    };

    tracing::debug!("Setting {}.{} of {record}", key.section, key.option);
    if let Some(widget) = map.widget_mut(&key) {
        widget.set_value(value);
    }
    Ok(())
}

fn report(report: &DependencyReport) {
    for cycle in &report.cycles {
        let members: Vec<String> = cycle.iter().map(ToString::to_string).collect();
        tracing::warn!("Options depend on each other: {}", members.join(" -> "));
    }
    if !report.stabilized {
        eprintln!(
            "{}",
            format!(
                "Dependencies did not settle after {} passes; some fields may be shown or hidden incorrectly",
                report.passes
            )
            .warning()
        );
    }
}
