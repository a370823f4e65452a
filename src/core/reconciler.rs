// src/core/reconciler.rs

//! # Reconciler
//!
//! [`ConfigArgParser`] binds a CLI declaration to a [`ConfigStore`]. Each parse cycle
//! loads the store, seeds the parameter tree with stored values, lets the user mutate
//! the store through the config option group, and finally parses the command line with
//! stored values standing in as defaults.

use crate::cli;
use crate::constants::KEY_SEPARATOR;
use crate::core::declaration::Declaration;
use crate::core::format::Format;
use crate::core::parser_tree::{ParserTree, flatten};
use crate::core::store::{ConfigStore, StoreError};
use crate::models::{MutationCommand, Namespace, ParseMode};
use clap::Command;
use colored::Colorize;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::path::PathBuf;
use thiserror::Error;

/// Errors ending a parse cycle.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// `--set` named a key that no option declares.
    #[error("{}", unknown_key_message(.key))]
    UnknownKey {
        /// The dotted key as given.
        key: String,
    },
    /// Rejected by clap, including `--help` and `--version`.
    #[error(transparent)]
    Clap(#[from] clap::Error),
    /// Loading or saving the config file failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn unknown_key_message(key: &str) -> String {
    format!(t!("reconcile.error.unknown_key"), key = key)
}

impl ReconcileError {
    /// Reports the error and terminates the process. clap errors keep clap's own
    /// rendering and exit codes; everything else exits with status 2.
    pub fn exit(&self) -> ! {
        match self {
            Self::Clap(e) => e.exit(),
            other => {
                eprintln!("{}: {}", t!("common.error.prefix").red().bold(), other);
                std::process::exit(2)
            }
        }
    }
}

/// What a parse cycle ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The resolved options.
    Parsed(Namespace),
    /// The store was mutated and the parser is configured to stop there.
    Changed(MutationCommand),
}

/// A command-line parser whose defaults live in a config file.
#[derive(Debug)]
pub struct ConfigArgParser {
    command: Command,
    tree: ParserTree,
    store: ConfigStore,
    group_name: String,
    exit_on_change: bool,
    seed_defaults: bool,
}

impl ConfigArgParser {
    /// Binds `command` to the config file at `path`. The file format follows the
    /// extension; nothing is read until the first parse.
    pub fn new(command: Command, path: impl Into<PathBuf>) -> Self {
        let tree = ParserTree::from_declaration(&command);
        Self {
            command,
            tree,
            store: ConfigStore::new(path),
            group_name: t!("cli.group.heading").to_string(),
            exit_on_change: false,
            seed_defaults: true,
        }
    }

    /// Stop with [`Outcome::Changed`] after a successful mutation instead of parsing on.
    pub fn exit_on_change(mut self, enabled: bool) -> Self {
        self.exit_on_change = enabled;
        self
    }

    /// Help heading of the config option group.
    pub fn group_name(mut self, name: impl Into<String>) -> Self {
        self.group_name = name.into();
        self
    }

    /// Forces the file format regardless of extension.
    pub fn format(mut self, format: Format) -> Self {
        let path = self.store.path().to_path_buf();
        self.store = ConfigStore::with_format(path, format);
        self
    }

    /// Replaces the backing store.
    pub fn with_store(mut self, store: ConfigStore) -> Self {
        self.store = store;
        self
    }

    /// Write declared defaults missing from the store into it on each parse (on by default).
    pub fn seed_defaults(mut self, enabled: bool) -> Self {
        self.seed_defaults = enabled;
        self
    }

    /// The backing store.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Mutable access to the backing store, e.g. to edit it between parses.
    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    /// Defaults and required flags as of the last parse.
    pub fn tree(&self) -> &ParserTree {
        &self.tree
    }

    /// The declaration as given, without the config option group.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// The declaration with the config option group appended.
    pub fn full_command(&self) -> Command {
        cli::with_config_options(self.command.clone(), self.group_name.clone())
    }

    /// Parses the process arguments, exiting on error or after a mutation.
    pub fn parse(&mut self) -> Namespace {
        self.parse_from(std::env::args_os())
    }

    /// Like [`parse`](Self::parse), with explicit arguments (program name first).
    pub fn parse_from<I, T>(&mut self, itr: I) -> Namespace
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match self.try_parse_from(itr) {
            Ok(Outcome::Parsed(namespace)) => namespace,
            Ok(Outcome::Changed(_)) => std::process::exit(0),
            Err(e) => e.exit(),
        }
    }

    /// Runs one full reconciliation cycle over `itr` (program name first).
    pub fn try_parse_from<I, T>(&mut self, itr: I) -> Result<Outcome, ReconcileError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = itr.into_iter().map(Into::into).collect();
        let command = self.full_command();

        self.store.load()?;
        self.tree.reset();
        if self.seed_defaults {
            seed_store(&mut self.store, &self.tree)?;
        }
        self.tree.update_from_flattened(&self.store.flattened());

        // Required flags stay relaxed until the final parse, on every exit path.
        let snapshot = self.tree.disable_required();
        log::debug!(
            "Relaxed required options; still required: {:?}",
            snapshot.still_required_keys()
        );
        let mut tree = scopeguard::guard(&mut self.tree, move |tree| {
            tree.reenable_required(&snapshot)
        });

        let early = command.clone().ignore_errors(true).try_get_matches_from(&args)?;
        if let Some(mutation) = cli::mutation_from_matches(&early) {
            let known = flatten(&tree.get_defaults(), KEY_SEPARATOR);
            if apply_mutation(&mut self.store, &known, &mutation)? {
                self.store.save()?;
                self.store.load()?;
                if self.exit_on_change {
                    return Ok(Outcome::Changed(mutation));
                }
            }
        }

        tree.restore_declared_defaults();
        tree.update_from_flattened(&self.store.flattened());
        drop(tree);

        let parsed = command.parse_level(&self.tree, &args, ParseMode::Strict)?;
        let namespace = self.tree.resolve(&parsed);
        log::trace!("Resolved namespace: {:?}", namespace);
        Ok(Outcome::Parsed(namespace))
    }
}

/// Writes each declared, serializable, non-null default that has no stored counterpart
/// into the store, then saves once if anything was added.
fn seed_store(store: &mut ConfigStore, tree: &ParserTree) -> Result<(), StoreError> {
    let stored = store.flattened();
    let missing: Map<String, Value> = flatten(&tree.get_defaults(), KEY_SEPARATOR)
        .into_iter()
        .filter(|(key, value)| {
            !value.is_null() && !overlaps_stored(&stored, key) && store.try_serialize(value)
        })
        .collect();
    let seeded = store.seed(missing)?;
    if seeded > 0 {
        log::debug!("Seeded {} declared defaults into the config", seeded);
    }
    Ok(())
}

/// True when `key`, one of its parents, or one of its children already holds a value.
fn overlaps_stored(stored: &Map<String, Value>, key: &str) -> bool {
    stored.keys().any(|existing| {
        existing == key
            || key.starts_with(&format!("{existing}{KEY_SEPARATOR}"))
            || existing.starts_with(&format!("{key}{KEY_SEPARATOR}"))
    })
}

/// Applies `mutation` to the store in memory. Returns whether the store should be
/// persisted.
fn apply_mutation(
    store: &mut ConfigStore,
    known: &Map<String, Value>,
    mutation: &MutationCommand,
) -> Result<bool, ReconcileError> {
    match mutation {
        MutationCommand::Set { key, value } => {
            if !known.contains_key(key) {
                return Err(ReconcileError::UnknownKey { key: key.clone() });
            }
            store.insert_dotted(key, value.clone())?;
            log::info!(t!("reconcile.info.set"), key = key, value = value);
            Ok(true)
        }
        MutationCommand::Reset { keys } if keys.is_empty() => {
            log::warn!(t!("reconcile.warn.reset_empty"));
            Ok(false)
        }
        MutationCommand::Reset { keys } => {
            for key in keys {
                match store.remove_dotted(key)? {
                    Some(_) => log::info!(t!("reconcile.info.reset"), key = key),
                    None => log::warn!(t!("reconcile.warn.reset_missing"), key = key),
                }
            }
            Ok(true)
        }
        MutationCommand::ResetAll => {
            store.clear();
            log::info!(t!("reconcile.info.reset_all"));
            Ok(true)
        }
    }
}
