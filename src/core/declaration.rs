// src/core/declaration.rs

//! The seam between the reconciliation logic and whatever library declares the CLI.
//!
//! The core only needs to enumerate options (destination, default, required) and
//! sub-commands, and to run a lenient or strict parse that reports what the user
//! actually typed. [`Declaration`] captures exactly that; it is implemented for
//! [`clap::Command`].

use crate::constants::{KEY_SEPARATOR, RESET_ALL_ARG_ID, RESET_ARG_ID, SET_ARG_ID};
use crate::core::coerce::{coerce_like, coerce_value};
use crate::core::parser_tree::ParserTree;
use crate::models::{LevelDecl, OptionDecl, ParseMode, ParsedLevel};
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::builder::ValueParser;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{Map, Value};
use std::ffi::OsString;

/// A CLI declaration the parameter tree can be built from and parsed through.
pub trait Declaration {
    /// Error reported by a strict parse.
    type Error: std::error::Error;

    /// Options and sub-commands of this level, recursively.
    fn declare(&self) -> LevelDecl;

    /// Parses `args` (program name first) and reports, per level, the values that were
    /// given explicitly. The tree decides required-ness; in strict mode a required
    /// option that is neither supplied nor backed by a truthy default is an error.
    fn parse_level(
        &self,
        tree: &ParserTree,
        args: &[OsString],
        mode: ParseMode,
    ) -> Result<ParsedLevel, Self::Error>;
}

impl Declaration for Command {
    type Error = clap::Error;

    fn declare(&self) -> LevelDecl {
        LevelDecl {
            options: self
                .get_arguments()
                .filter(|arg| is_option(arg))
                .map(|arg| OptionDecl {
                    dest: arg.get_id().as_str().to_string(),
                    default: declared_default(arg),
                    required: arg.is_required_set(),
                })
                .collect(),
            subcommands: self
                .get_subcommands()
                .map(|sub| (sub.get_name().to_string(), sub.declare()))
                .collect(),
        }
    }

    fn parse_level(
        &self,
        tree: &ParserTree,
        args: &[OsString],
        mode: ParseMode,
    ) -> Result<ParsedLevel, clap::Error> {
        let mut command = relax_required(self.clone(), tree).ignore_errors(mode == ParseMode::Lenient);
        let matches = command.try_get_matches_from_mut(args.iter().cloned())?;
        let parsed = collect_level(self, tree, &matches);

        if mode == ParseMode::Strict {
            let missing = tree.missing_required(&parsed);
            if !missing.is_empty() {
                // Rendering an arg needs the values clap fills in while building.
                let mut built = self.clone();
                built.build();
                let names = missing
                    .iter()
                    .map(|key| display_name(&built, key))
                    .collect::<Vec<_>>()
                    .join("\n  ");
                log::debug!("Missing required options: {:?}", missing);
                return Err(command.error(
                    ErrorKind::MissingRequiredArgument,
                    format!(t!("reconcile.error.missing_required"), args = names),
                ));
            }
        }
        Ok(parsed)
    }
}

/// Help and version actions, and the config group itself, are not options.
fn is_option(arg: &Arg) -> bool {
    let id = arg.get_id().as_str();
    !matches!(
        arg.get_action(),
        ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version
    ) && ![SET_ARG_ID, RESET_ARG_ID, RESET_ALL_ARG_ID].contains(&id)
}

fn takes_many(arg: &Arg) -> bool {
    matches!(arg.get_action(), ArgAction::Append)
        || arg.get_num_args().is_some_and(|range| range.max_values() > 1)
}

/// Options parsed by clap's plain string parser keep their declared defaults as text.
fn keeps_text(arg: &Arg) -> bool {
    let flag = matches!(
        arg.get_action(),
        ArgAction::SetTrue | ArgAction::SetFalse | ArgAction::Count
    );
    !flag && arg.get_value_parser().type_id() == ValueParser::string().type_id()
}

fn declared_default(arg: &Arg) -> Value {
    let as_text = keeps_text(arg);
    let mut defaults: Vec<Value> = arg
        .get_default_values()
        .iter()
        .filter_map(|value| value.to_str())
        .map(|value| {
            if as_text {
                Value::String(value.to_string())
            } else {
                coerce_value(value)
            }
        })
        .collect();

    let first = if defaults.is_empty() {
        None
    } else {
        Some(defaults.remove(0))
    };

    match arg.get_action() {
        ArgAction::SetTrue => first.unwrap_or(Value::Bool(false)),
        ArgAction::SetFalse => first.unwrap_or(Value::Bool(true)),
        ArgAction::Count => first.unwrap_or_else(|| Value::from(0)),
        _ if takes_many(arg) => match first {
            Some(head) => {
                defaults.insert(0, head);
                Value::Array(defaults)
            }
            None => Value::Null,
        },
        _ => first.unwrap_or(Value::Null),
    }
}

/// Hands required-ness over to the tree: clap itself sees every tree option as optional.
fn relax_required(mut command: Command, tree: &ParserTree) -> Command {
    for (dest, _) in tree.options() {
        if command.get_arguments().any(|arg| arg.get_id() == dest) {
            command = command.mut_arg(dest, |arg| arg.required(false));
        }
    }
    for (name, child) in tree.subcommands() {
        if command.find_subcommand(name).is_some() {
            command = command.mut_subcommand(name, |sub| relax_required(sub, child));
        }
    }
    command
}

fn collect_level(command: &Command, tree: &ParserTree, matches: &ArgMatches) -> ParsedLevel {
    let mut supplied = Map::new();
    for arg in command.get_arguments() {
        let id = arg.get_id().as_str();
        let Some(option) = tree.option(id) else {
            continue;
        };
        if matches.value_source(id) != Some(ValueSource::CommandLine) {
            continue;
        }
        if let Some(value) = read_value(arg, matches, &option.default) {
            supplied.insert(id.to_string(), value);
        }
    }

    let subcommand = matches.subcommand().and_then(|(name, sub_matches)| {
        let sub_command = command.find_subcommand(name)?;
        let sub_tree = tree.subcommand(name)?;
        Some((
            name.to_string(),
            Box::new(collect_level(sub_command, sub_tree, sub_matches)),
        ))
    });

    ParsedLevel {
        supplied,
        subcommand,
    }
}

fn read_value(arg: &Arg, matches: &ArgMatches, hint: &Value) -> Option<Value> {
    let id = arg.get_id().as_str();
    match arg.get_action() {
        ArgAction::SetTrue | ArgAction::SetFalse => matches
            .try_get_one::<bool>(id)
            .ok()
            .flatten()
            .map(|flag| Value::Bool(*flag)),
        ArgAction::Count => matches
            .try_get_one::<u8>(id)
            .ok()
            .flatten()
            .map(|count| Value::from(*count)),
        _ => {
            let raw: Vec<String> = matches
                .try_get_raw(id)
                .ok()
                .flatten()?
                .map(|value| value.to_string_lossy().into_owned())
                .collect();
            if takes_many(arg) {
                let element_hint = hint
                    .as_array()
                    .and_then(|values| values.first())
                    .unwrap_or(&Value::Null);
                Some(Value::Array(
                    raw.iter().map(|value| coerce_like(value, element_hint)).collect(),
                ))
            } else {
                raw.first().map(|value| coerce_like(value, hint))
            }
        }
    }
}

/// How clap would render the option behind a dotted key, e.g. `--input-folder <DIR>`.
/// `command` must be built.
fn display_name(command: &Command, key: &str) -> String {
    match key.split_once(KEY_SEPARATOR) {
        Some((head, rest)) => match command.find_subcommand(head) {
            Some(sub) => format!("{} {}", head, display_name(sub, rest)),
            None => key.to_string(),
        },
        None => command
            .get_arguments()
            .find(|arg| arg.get_id() == key)
            .map(|arg| arg.to_string())
            .unwrap_or_else(|| key.to_string()),
    }
}
