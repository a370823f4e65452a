// src/core/format.rs

//! Serialization back-ends for the config file.
//!
//! A [`FormatHandler`] knows where the backing file lives and how to turn a mapping into
//! bytes and back. The set of formats is closed, so dispatch is a plain `match` on
//! [`Format`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// JSON files are written with four-space indentation.
const JSON_INDENT: &[u8] = b"    ";

/// Key used to wrap a lone value into a table when checking TOML serializability.
const TOML_WRAP_KEY: &str = "value";

/// Errors raised by a [`FormatHandler`].
#[derive(Error, Debug)]
pub enum FormatError {
    /// The backing file could not be read.
    #[error("Could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The backing file or its parent directory could not be written.
    #[error("Could not write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Malformed JSON, or JSON whose top level is not an object.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed TOML.
    #[error("Invalid TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// A value TOML cannot represent.
    #[error("Failed to serialize to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// The on-disk representation of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Pretty-printed JSON, four-space indent.
    #[default]
    Json,
    /// TOML.
    Toml,
}

impl Format {
    /// Picks the format from a file extension: `.toml` is TOML, everything else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Reads and writes one backing file in one [`Format`].
#[derive(Debug, Clone)]
pub struct FormatHandler {
    format: Format,
    path: PathBuf,
}

impl FormatHandler {
    /// A handler for `path`; nothing is touched until `load` or `save`.
    pub fn new(format: Format, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
        }
    }

    /// The format used for reading and writing.
    pub fn format(&self) -> Format {
        self.format
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Points the handler at another file.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    /// Serializes `contents` and overwrites the backing file, creating parent directories.
    pub fn save(&self, contents: &Map<String, Value>) -> Result<(), FormatError> {
        let text = self.serialize(contents)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| FormatError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }

        log::trace!("Writing {} bytes to '{}'", text.len(), self.path.display());
        fs::write(&self.path, text).map_err(|source| FormatError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Reads the backing file. Malformed input is an error; a document that is not a
    /// mapping at the top level is rejected as well.
    pub fn load(&self) -> Result<Map<String, Value>, FormatError> {
        let text = fs::read_to_string(&self.path).map_err(|source| FormatError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        self.deserialize(&text)
    }

    /// Reports whether `value` can be written in this format, without raising.
    pub fn try_serialize(&self, value: &Value) -> bool {
        match self.format {
            Format::Json => serde_json::to_string(value).is_ok(),
            Format::Toml => {
                let mut table = Map::new();
                table.insert(TOML_WRAP_KEY.to_string(), value.clone());
                toml::to_string(&table).is_ok()
            }
        }
    }

    fn serialize(&self, contents: &Map<String, Value>) -> Result<String, FormatError> {
        match self.format {
            Format::Json => {
                let mut buffer = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
                let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
                contents.serialize(&mut serializer)?;
                // serde_json only ever emits valid UTF-8.
                Ok(String::from_utf8_lossy(&buffer).into_owned())
            }
            Format::Toml => Ok(toml::to_string_pretty(&without_nulls(contents))?),
        }
    }

    fn deserialize(&self, text: &str) -> Result<Map<String, Value>, FormatError> {
        match self.format {
            Format::Json => Ok(serde_json::from_str(text)?),
            Format::Toml => Ok(toml::from_str(text)?),
        }
    }
}

/// TOML has no null: null entries are left out of tables and arrays.
fn without_nulls(contents: &Map<String, Value>) -> Map<String, Value> {
    contents
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), strip_nulls(value)))
        .collect()
}

fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(without_nulls(map)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|item| !item.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> Map<String, Value> {
        match json!({
            "scale": 4,
            "recursive": false,
            "extension": "png",
            "sizes": [1, 2, 3],
            "convert": {"quality": 90, "lossless": true}
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempdir().unwrap();
        let handler = FormatHandler::new(Format::Json, dir.path().join("cfg.json"));
        handler.save(&sample()).unwrap();
        assert_eq!(handler.load().unwrap(), sample());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempdir().unwrap();
        let handler = FormatHandler::new(Format::Toml, dir.path().join("cfg.toml"));
        handler.save(&sample()).unwrap();
        assert_eq!(handler.load().unwrap(), sample());
    }

    #[test]
    fn test_json_uses_four_space_indent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let handler = FormatHandler::new(Format::Json, &path);
        let mut map = Map::new();
        map.insert("threads".to_string(), json!(4));
        handler.save(&map).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "{\n    \"threads\": 4\n}");
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("cfg.json");
        FormatHandler::new(Format::Json, &path).save(&Map::new()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("bad.json");
        fs::write(&json_path, "{ not json").unwrap();
        assert!(matches!(
            FormatHandler::new(Format::Json, &json_path).load(),
            Err(FormatError::Json(_))
        ));

        let toml_path = dir.path().join("bad.toml");
        fs::write(&toml_path, "scale = = 3").unwrap();
        assert!(matches!(
            FormatHandler::new(Format::Toml, &toml_path).load(),
            Err(FormatError::TomlParse(_))
        ));
    }

    #[test]
    fn test_json_top_level_must_be_an_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(FormatHandler::new(Format::Json, &path).load().is_err());
    }

    #[test]
    fn test_try_serialize() {
        let json = FormatHandler::new(Format::Json, "unused.json");
        assert!(json.try_serialize(&json!(null)));
        assert!(json.try_serialize(&json!({"a": [1, "b"]})));

        let toml = FormatHandler::new(Format::Toml, "unused.toml");
        assert!(toml.try_serialize(&json!(4)));
        assert!(toml.try_serialize(&json!(["a", "b"])));
        assert!(!toml.try_serialize(&json!(null)));
        assert!(!toml.try_serialize(&json!({"nested": null})));
    }

    #[test]
    fn test_toml_save_leaves_out_nulls() {
        let dir = tempdir().unwrap();
        let handler = FormatHandler::new(Format::Toml, dir.path().join("cfg.toml"));
        let contents = match json!({
            "threads": null,
            "scale": 3,
            "convert": {"quality": null, "format": "webp"},
            "sizes": [1, null, 2]
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        handler.save(&contents).unwrap();

        assert_eq!(
            Value::Object(handler.load().unwrap()),
            json!({"scale": 3, "convert": {"format": "webp"}, "sizes": [1, 2]})
        );
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/config.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("a/config.TOML")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("a/config.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a/config")), Format::Json);
    }
}
