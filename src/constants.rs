// src/constants.rs

/// Argument id of `--set KEY VALUE` in the config option group.
pub const SET_ARG_ID: &str = "set";

/// Argument id of `--reset [KEY ...]` in the config option group.
pub const RESET_ARG_ID: &str = "reset";

/// Argument id of `--reset-all` in the config option group.
pub const RESET_ALL_ARG_ID: &str = "reset_all";

/// Id of the mutually exclusive group holding the three config arguments.
pub const CONFIG_GROUP_ID: &str = "config_options";

/// Separator joining nested mapping levels into a dotted key.
pub const KEY_SEPARATOR: char = '.';

/// File name used when a config path is derived from an application name.
pub const DEFAULT_JSON_FILENAME: &str = "config.json";

/// TOML counterpart of [`DEFAULT_JSON_FILENAME`].
pub const DEFAULT_TOML_FILENAME: &str = "config.toml";

/// Environment variable the demo binary reads to override its config file location.
pub const DEMO_CONFIG_ENV: &str = "CFGDEMO_CONFIG";
