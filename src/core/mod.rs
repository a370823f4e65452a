// src/core/mod.rs

//! The store, the parameter tree and the parts that reconcile them with a CLI.

pub mod coerce;
pub mod declaration;
pub mod format;
pub mod injector;
pub mod parser_tree;
pub mod paths;
pub mod reconciler;
pub mod store;
