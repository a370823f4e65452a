// src/models.rs

//! Plain data passed between the declaration, the tree and the caller.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

// --- DECLARATION SNAPSHOT ---
// What a parser level declares, independent of the parsing library that declared it.

/// One option as declared by a parser level.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    /// Destination name; also the key under which the option is stored.
    pub dest: String,
    /// Declared default, `Value::Null` when the declaration has none.
    pub default: Value,
    /// Whether the declaration demands a value on the command line.
    pub required: bool,
}

/// A parser level: its options plus its named sub-command levels, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelDecl {
    /// Options of this level.
    pub options: Vec<OptionDecl>,
    /// Sub-command levels, keyed by sub-command name.
    pub subcommands: Vec<(String, LevelDecl)>,
}

// --- PARSE RESULTS ---

/// How forgiving a parse should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Every parse error is ignored and whatever was recognised is returned.
    Lenient,
    /// Errors, including missing required options, are reported.
    Strict,
}

/// The raw outcome of parsing one level: only values actually given on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLevel {
    /// Values typed on the command line at this level, keyed by destination.
    pub supplied: Map<String, Value>,
    /// The selected sub-command and what was parsed below it.
    pub subcommand: Option<(String, Box<ParsedLevel>)>,
}

/// A config mutation requested through the config option group.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationCommand {
    /// `--set KEY VALUE`, with `VALUE` already coerced.
    Set {
        /// Dotted key.
        key: String,
        /// Coerced value.
        value: Value,
    },
    /// `--reset KEY...`
    Reset {
        /// Dotted keys; may be empty.
        keys: Vec<String>,
    },
    /// `--reset-all`
    ResetAll,
}

/// The resolved parameter set handed back to the caller.
///
/// Values are keyed by destination name. Keys of nested sub-commands are merged flat,
/// a deeper level overriding its parent on collision; the chain of selected
/// sub-commands is kept separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    values: Map<String, Value>,
    subcommands: Vec<String>,
}

impl Namespace {
    /// An empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `values` with no sub-command selected.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            values,
            subcommands: Vec::new(),
        }
    }

    /// The raw value of `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Deserializes a single entry. `Ok(None)` when the key is absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        self.values
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Sets `key`, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// Overlays `other` onto `self`; values from `other` win.
    pub fn merge(&mut self, other: Self) {
        self.values.extend(other.values);
        self.subcommands.extend(other.subcommands);
    }

    pub(crate) fn push_subcommand(&mut self, name: impl Into<String>) {
        self.subcommands.insert(0, name.into());
    }

    /// The deepest selected sub-command, if any.
    pub fn subcommand(&self) -> Option<&str> {
        self.subcommands.last().map(String::as_str)
    }

    /// Every selected sub-command, outermost first.
    pub fn subcommand_path(&self) -> &[String] {
        &self.subcommands
    }

    /// Deserializes the whole namespace into a caller-defined struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.values.clone()))
    }

    /// The values, without sub-command information.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Consumes the namespace, keeping only the values.
    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.values.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for Namespace {
    fn from(values: Map<String, Value>) -> Self {
        Self::from_map(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::path::PathBuf;

    fn namespace(value: Value) -> Namespace {
        match value {
            Value::Object(map) => Namespace::from_map(map),
            _ => panic!("test namespaces are built from objects"),
        }
    }

    #[test]
    fn test_merge_later_values_win() {
        let mut base = namespace(json!({"scale": 4, "threads": 2}));
        let mut child = namespace(json!({"scale": 8, "purge": true}));
        child.push_subcommand("convert");

        base.merge(child);

        assert_eq!(base.get("scale"), Some(&json!(8)));
        assert_eq!(base.get("threads"), Some(&json!(2)));
        assert_eq!(base.get("purge"), Some(&json!(true)));
        assert_eq!(base.subcommand(), Some("convert"));
    }

    #[test]
    fn test_push_subcommand_keeps_outermost_first() {
        let mut ns = Namespace::new();
        ns.push_subcommand("inner");
        ns.push_subcommand("outer");
        assert_eq!(ns.subcommand_path(), ["outer", "inner"]);
        assert_eq!(ns.subcommand(), Some("inner"));
    }

    #[test]
    fn test_get_as_typed_and_missing() {
        let ns = namespace(json!({"threads": 6, "input_folder": "/tmp/in"}));
        assert_eq!(ns.get_as::<u32>("threads").unwrap(), Some(6));
        assert_eq!(
            ns.get_as::<PathBuf>("input_folder").unwrap(),
            Some(PathBuf::from("/tmp/in"))
        );
        assert_eq!(ns.get_as::<u32>("absent").unwrap(), None);
        assert!(ns.get_as::<u32>("input_folder").is_err());
    }

    #[test]
    fn test_deserialize_into_struct() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Options {
            scale: u32,
            extension: Option<String>,
        }

        let ns = namespace(json!({"scale": 2, "extension": null, "ignored": 1}));
        let options: Options = ns.deserialize().unwrap();
        assert_eq!(
            options,
            Options {
                scale: 2,
                extension: None
            }
        );
    }
}
