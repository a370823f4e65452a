// src/cli/mod.rs

//! The config option group (`--set`, `--reset`, `--reset-all`) and how its matches
//! become a [`MutationCommand`].

use crate::constants::{CONFIG_GROUP_ID, RESET_ALL_ARG_ID, RESET_ARG_ID, SET_ARG_ID};
use crate::core::coerce::coerce_value;
use crate::models::MutationCommand;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};

/// Appends the three mutually exclusive config arguments to `command`, listed under
/// their own help heading.
pub fn with_config_options(command: Command, heading: impl Into<String>) -> Command {
    let heading = heading.into();
    command
        .arg(
            Arg::new(SET_ARG_ID)
                .long("set")
                .num_args(2)
                .value_names(["KEY", "VALUE"])
                .help(t!("cli.set.help"))
                .help_heading(heading.clone()),
        )
        .arg(
            Arg::new(RESET_ARG_ID)
                .long("reset")
                .num_args(0..)
                .value_name("KEY")
                .help(t!("cli.reset.help"))
                .help_heading(heading.clone()),
        )
        .arg(
            Arg::new(RESET_ALL_ARG_ID)
                .long("reset-all")
                .action(ArgAction::SetTrue)
                .help(t!("cli.reset_all.help"))
                .help_heading(heading),
        )
        .group(
            ArgGroup::new(CONFIG_GROUP_ID)
                .args([SET_ARG_ID, RESET_ARG_ID, RESET_ALL_ARG_ID])
                .multiple(false),
        )
}

/// Reads the config group out of top-level matches. `--set` with anything but exactly a
/// key and a value is ignored here; the strict parse reports it.
pub fn mutation_from_matches(matches: &ArgMatches) -> Option<MutationCommand> {
    if let Some(values) = matches.try_get_many::<String>(SET_ARG_ID).ok().flatten() {
        let values: Vec<&String> = values.collect();
        if let [key, value] = values.as_slice() {
            return Some(MutationCommand::Set {
                key: key.to_string(),
                value: coerce_value(value),
            });
        }
    }

    if matches.value_source(RESET_ARG_ID) == Some(ValueSource::CommandLine) {
        let keys = matches
            .try_get_many::<String>(RESET_ARG_ID)
            .ok()
            .flatten()
            .map(|keys| keys.cloned().collect())
            .unwrap_or_default();
        return Some(MutationCommand::Reset { keys });
    }

    let reset_all = matches
        .try_get_one::<bool>(RESET_ALL_ARG_ID)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false);
    reset_all.then_some(MutationCommand::ResetAll)
}
