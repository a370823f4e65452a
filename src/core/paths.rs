// src/core/paths.rs

//! Where config files live by default.

use crate::constants::{DEFAULT_JSON_FILENAME, DEFAULT_TOML_FILENAME};
use crate::core::format::Format;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating a config file.
#[derive(Error, Debug)]
pub enum PathError {
    /// The platform has no per-user config directory.
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    /// A `~` or variable in the path could not be expanded.
    #[error("Failed to expand config path '{template}': {message}")]
    Expansion {
        /// The path as given.
        template: String,
        /// Why expansion failed.
        message: String,
    },
}

/// Returns the per-application config directory, e.g. `~/.config/<app_name>`.
/// Nothing is created; the store creates parent directories on its first save.
pub fn app_config_dir(app_name: &str) -> Result<PathBuf, PathError> {
    dirs::config_dir()
        .map(|dir| dir.join(app_name))
        .ok_or(PathError::ConfigDirNotFound)
}

/// The conventional config file of an application for the given format.
pub fn default_config_path(app_name: &str, format: Format) -> Result<PathBuf, PathError> {
    let file_name = match format {
        Format::Json => DEFAULT_JSON_FILENAME,
        Format::Toml => DEFAULT_TOML_FILENAME,
    };
    app_config_dir(app_name).map(|dir| dir.join(file_name))
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a user-supplied path.
///
/// # Errors
/// Returns an error if the template references an undefined variable.
pub fn expand_config_path(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        message: e.to_string(),
    })?;
    let path = PathBuf::from(expanded.into_owned());
    Ok(dunce::simplified(&path).to_path_buf())
}

/// The config file to use: the expanded value of `env_var` when it is set and non-empty,
/// otherwise [`default_config_path`].
pub fn resolve_config_path(
    app_name: &str,
    format: Format,
    env_var: &str,
) -> Result<PathBuf, PathError> {
    match std::env::var(env_var) {
        Ok(template) if !template.trim().is_empty() => {
            log::debug!("Using config path from {}: {}", env_var, template);
            expand_config_path(&template)
        }
        _ => default_config_path(app_name, format),
    }
}
