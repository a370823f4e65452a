//! Command-line parsing whose defaults persist in a JSON or TOML file.
//!
//! [`ConfigArgParser`] wraps a `clap::Command`: values stored in the config file become
//! the defaults of the matching options, and the added `--set`, `--reset` and
//! `--reset-all` options edit that file. [`wrap_config`] does the same for the
//! parameters of a plain function.

include!(concat!(env!("OUT_DIR"), "/messages.rs"));

pub mod cli;
/// Argument ids, separators and default file names.
pub mod constants;
pub mod core;
pub mod models;

pub use crate::core::declaration::Declaration;
pub use crate::core::format::{Format, FormatError, FormatHandler};
pub use crate::core::injector::{
    ConfiguredFn, InjectError, Param, SharedStore, Signature, wrap_config,
};
pub use crate::core::parser_tree::{ParserTree, RequiredSnapshot, TreeOption};
pub use crate::core::reconciler::{ConfigArgParser, Outcome, ReconcileError};
pub use crate::core::store::{ConfigStore, StoreError, StoreOptions};
pub use crate::models::{MutationCommand, Namespace};
