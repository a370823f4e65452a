// src/core/parser_tree.rs

//! # Parameter Tree
//!
//! A [`ParserTree`] mirrors a parser's declared options and, recursively, its
//! sub-commands. It owns the live state of every option (current default and required
//! flag), which lets stored values be pushed in as defaults and lets required-ness be
//! waived for one parse cycle and restored afterwards.
//!
//! Nested levels are addressed with dotted keys: `convert.scale` is the `scale` option
//! of the `convert` sub-command.

use crate::constants::KEY_SEPARATOR;
use crate::core::declaration::Declaration;
use crate::models::{LevelDecl, Namespace, OptionDecl, ParseMode, ParsedLevel};
use serde_json::{Map, Value};
use std::ffi::OsString;

/// Live state of one declared option.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeOption {
    /// Current default: the declared one, or a stored value pushed in over it.
    pub default: Value,
    /// Whether the option must be satisfied in a strict parse.
    pub required: bool,
    declared_default: Value,
    declared_required: bool,
}

impl TreeOption {
    fn new(decl: OptionDecl) -> Self {
        Self {
            declared_default: decl.default.clone(),
            declared_required: decl.required,
            default: decl.default,
            required: decl.required,
        }
    }

    /// The default written in the declaration, before any stored value was applied.
    pub fn declared_default(&self) -> &Value {
        &self.declared_default
    }
}

/// Options whose required flag was cleared by [`ParserTree::disable_required`].
///
/// `still_required` holds the options that had no usable default and were only made
/// optional so a parse could proceed; `waived` holds the ones a default stood in for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequiredSnapshot {
    /// Options of this level with no usable default.
    pub still_required: Vec<String>,
    /// Options of this level satisfied by their default.
    pub waived: Vec<String>,
    /// Snapshots of the sub-command levels.
    pub subcommands: Vec<(String, RequiredSnapshot)>,
}

impl RequiredSnapshot {
    /// True when nothing was relaxed at any depth.
    pub fn is_empty(&self) -> bool {
        self.still_required.is_empty() && self.waived.is_empty() && self.subcommands.is_empty()
    }

    /// Dotted keys of every still-required option, at any depth.
    pub fn still_required_keys(&self) -> Vec<String> {
        let mut keys = self.still_required.clone();
        for (name, child) in &self.subcommands {
            keys.extend(
                child
                    .still_required_keys()
                    .into_iter()
                    .map(|key| format!("{}{}{}", name, KEY_SEPARATOR, key)),
            );
        }
        keys
    }
}

/// One parser level and, recursively, its sub-command levels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParserTree {
    options: Vec<(String, TreeOption)>,
    subcommands: Vec<(String, ParserTree)>,
}

impl ParserTree {
    /// Walks a parser declaration and mirrors it.
    pub fn from_declaration<D: Declaration + ?Sized>(declaration: &D) -> Self {
        Self::from_level(declaration.declare())
    }

    /// Builds a tree from a declaration snapshot.
    pub fn from_level(level: LevelDecl) -> Self {
        Self {
            options: level
                .options
                .into_iter()
                .map(|decl| (decl.dest.clone(), TreeOption::new(decl)))
                .collect(),
            subcommands: level
                .subcommands
                .into_iter()
                .map(|(name, child)| (name, Self::from_level(child)))
                .collect(),
        }
    }

    /// The option `dest` of this level.
    pub fn option(&self, dest: &str) -> Option<&TreeOption> {
        self.options.iter().find(|(d, _)| d == dest).map(|(_, o)| o)
    }

    fn option_mut(&mut self, dest: &str) -> Option<&mut TreeOption> {
        self.options.iter_mut().find(|(d, _)| d == dest).map(|(_, o)| o)
    }

    /// Options of this level in declaration order.
    pub fn options(&self) -> impl Iterator<Item = (&str, &TreeOption)> {
        self.options.iter().map(|(d, o)| (d.as_str(), o))
    }

    /// The child level of sub-command `name`.
    pub fn subcommand(&self, name: &str) -> Option<&Self> {
        self.subcommands.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    fn subcommand_mut(&mut self, name: &str) -> Option<&mut Self> {
        self.subcommands.iter_mut().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Child levels in declaration order.
    pub fn subcommands(&self) -> impl Iterator<Item = (&str, &Self)> {
        self.subcommands.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Current defaults as a nested mapping. Every declared sub-command contributes,
    /// not only a selected one.
    pub fn get_defaults(&self) -> Map<String, Value> {
        let mut out: Map<String, Value> = self
            .options
            .iter()
            .map(|(dest, option)| (dest.clone(), option.default.clone()))
            .collect();
        for (name, child) in &self.subcommands {
            out.insert(name.clone(), Value::Object(child.get_defaults()));
        }
        out
    }

    /// Overwrites option defaults from dotted keys. Keys that match no option are dropped.
    pub fn update_from_flattened(&mut self, flattened: &Map<String, Value>) {
        for (key, value) in flattened {
            if !self.apply_default(key, value) {
                log::trace!("No declared option for stored key '{}'; ignoring it", key);
            }
        }
    }

    fn apply_default(&mut self, key: &str, value: &Value) -> bool {
        match key.split_once(KEY_SEPARATOR) {
            Some((head, rest)) => match self.subcommand_mut(head) {
                Some(child) => child.apply_default(rest, value),
                None => false,
            },
            None => match self.option_mut(key) {
                Some(option) => {
                    option.default = value.clone();
                    true
                }
                None => false,
            },
        }
    }

    /// Puts every default back to what the declaration said.
    pub fn restore_declared_defaults(&mut self) {
        for (_, option) in &mut self.options {
            option.default = option.declared_default.clone();
        }
        for (_, child) in &mut self.subcommands {
            child.restore_declared_defaults();
        }
    }

    /// Returns the whole tree, defaults and required flags, to its declared state.
    pub fn reset(&mut self) {
        for (_, option) in &mut self.options {
            option.default = option.declared_default.clone();
            option.required = option.declared_required;
        }
        for (_, child) in &mut self.subcommands {
            child.reset();
        }
    }

    /// Clears the required flag of every required option at every depth and records
    /// what was cleared. Options without a truthy default land in `still_required`:
    /// the caller decides whether their absence is acceptable.
    pub fn disable_required(&mut self) -> RequiredSnapshot {
        let mut snapshot = RequiredSnapshot::default();

        for (dest, option) in &mut self.options {
            if !option.required {
                continue;
            }
            option.required = false;
            if is_truthy(&option.default) {
                snapshot.waived.push(dest.clone());
            } else {
                snapshot.still_required.push(dest.clone());
            }
        }

        for (name, child) in &mut self.subcommands {
            let child_snapshot = child.disable_required();
            if !child_snapshot.is_empty() {
                snapshot.subcommands.push((name.clone(), child_snapshot));
            }
        }
        snapshot
    }

    /// Inverse of [`disable_required`](Self::disable_required).
    ///
    /// A still-required option gets its flag back only while its default is falsy, so a
    /// value stored during this cycle satisfies it. Waived options always get it back.
    pub fn reenable_required(&mut self, snapshot: &RequiredSnapshot) {
        for dest in &snapshot.still_required {
            if let Some(option) = self.option_mut(dest)
                && !is_truthy(&option.default)
            {
                option.required = true;
            }
        }
        for dest in &snapshot.waived {
            if let Some(option) = self.option_mut(dest) {
                option.required = true;
            }
        }
        for (name, child_snapshot) in &snapshot.subcommands {
            if let Some(child) = self.subcommand_mut(name) {
                child.reenable_required(child_snapshot);
            }
        }
    }

    /// Lenient parse through `declaration`, resolved against this tree.
    pub fn parse<D: Declaration + ?Sized>(
        &self,
        declaration: &D,
        args: &[OsString],
    ) -> Result<Namespace, D::Error> {
        let parsed = declaration.parse_level(self, args, ParseMode::Lenient)?;
        Ok(self.resolve(&parsed))
    }

    /// Turns a parse result into a namespace: this level's defaults overlaid with what was
    /// supplied, then the selected child's namespace merged over that.
    pub fn resolve(&self, parsed: &ParsedLevel) -> Namespace {
        let mut namespace = Namespace::new();
        for (dest, option) in &self.options {
            let value = parsed
                .supplied
                .get(dest)
                .cloned()
                .unwrap_or_else(|| option.default.clone());
            namespace.insert(dest.clone(), value);
        }

        if let Some((name, child_parsed)) = &parsed.subcommand
            && let Some(child) = self.subcommand(name)
        {
            let mut child_namespace = child.resolve(child_parsed);
            child_namespace.push_subcommand(name.clone());
            namespace.merge(child_namespace);
        }
        namespace
    }

    /// Dotted keys of options that are required, were not supplied and have no truthy
    /// default, following only the selected sub-command chain.
    pub fn missing_required(&self, parsed: &ParsedLevel) -> Vec<String> {
        let mut missing: Vec<String> = self
            .options
            .iter()
            .filter(|(dest, option)| {
                option.required && !parsed.supplied.contains_key(dest) && !is_truthy(&option.default)
            })
            .map(|(dest, _)| dest.clone())
            .collect();

        if let Some((name, child_parsed)) = &parsed.subcommand
            && let Some(child) = self.subcommand(name)
        {
            missing.extend(
                child
                    .missing_required(child_parsed)
                    .into_iter()
                    .map(|key| format!("{}{}{}", name, KEY_SEPARATOR, key)),
            );
        }
        missing
    }
}

/// Flattens nested mappings into dotted keys. Recursion stops at non-mapping values;
/// an empty nested mapping contributes nothing.
pub fn flatten(map: &Map<String, Value>, separator: char) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        match value {
            Value::Object(inner) => {
                for (sub_key, sub_value) in flatten(inner, separator) {
                    out.insert(format!("{}{}{}", key, separator, sub_key), sub_value);
                }
            }
            other => {
                out.insert(key.clone(), other.clone());
            }
        }
    }
    out
}

/// `null`, `false`, zero, and empty strings, arrays or objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opt(dest: &str, default: Value, required: bool) -> OptionDecl {
        OptionDecl {
            dest: dest.to_string(),
            default,
            required,
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    /// root: input_folder (required), scale=4
    ///   convert: extension (required), quality=90
    ///     webp: lossless (required)
    ///   purge: purge_all=false
    fn sample_tree() -> ParserTree {
        ParserTree::from_level(LevelDecl {
            options: vec![
                opt("input_folder", Value::Null, true),
                opt("scale", json!(4), false),
            ],
            subcommands: vec![
                (
                    "convert".to_string(),
                    LevelDecl {
                        options: vec![
                            opt("extension", Value::Null, true),
                            opt("quality", json!(90), false),
                        ],
                        subcommands: vec![(
                            "webp".to_string(),
                            LevelDecl {
                                options: vec![opt("lossless", Value::Null, true)],
                                subcommands: vec![],
                            },
                        )],
                    },
                ),
                (
                    "purge".to_string(),
                    LevelDecl {
                        options: vec![opt("purge_all", json!(false), false)],
                        subcommands: vec![],
                    },
                ),
            ],
        })
    }

    fn required_flags(tree: &ParserTree) -> Vec<(String, bool)> {
        let mut flags: Vec<(String, bool)> = tree
            .options()
            .map(|(d, o)| (d.to_string(), o.required))
            .collect();
        for (name, child) in tree.subcommands() {
            flags.extend(
                required_flags(child)
                    .into_iter()
                    .map(|(k, r)| (format!("{}.{}", name, k), r)),
            );
        }
        flags
    }

    #[test]
    fn test_flatten_nested_mapping() {
        let nested = object(json!({
            "scale": 4,
            "convert": {"quality": 90, "webp": {"lossless": true}},
            "empty": {},
            "list": [1, {"not": "flattened"}]
        }));
        assert_eq!(
            Value::Object(flatten(&nested, '.')),
            json!({
                "scale": 4,
                "convert.quality": 90,
                "convert.webp.lossless": true,
                "list": [1, {"not": "flattened"}]
            })
        );
    }

    #[test]
    fn test_flatten_custom_separator() {
        let nested = object(json!({"a": {"b": 1}}));
        assert_eq!(Value::Object(flatten(&nested, '/')), json!({"a/b": 1}));
    }

    #[test]
    fn test_get_defaults_collects_every_subcommand() {
        let tree = sample_tree();
        assert_eq!(
            Value::Object(tree.get_defaults()),
            json!({
                "input_folder": null,
                "scale": 4,
                "convert": {"extension": null, "quality": 90, "webp": {"lossless": null}},
                "purge": {"purge_all": false}
            })
        );
    }

    #[test]
    fn test_update_from_flattened_routes_dotted_keys() {
        let mut tree = sample_tree();
        tree.update_from_flattened(&object(json!({
            "scale": 8,
            "convert.quality": 50,
            "convert.webp.lossless": true,
            "unknown": 1,
            "convert.unknown": 2,
            "nope.scale": 3
        })));

        assert_eq!(tree.option("scale").unwrap().default, json!(8));
        let convert = tree.subcommand("convert").unwrap();
        assert_eq!(convert.option("quality").unwrap().default, json!(50));
        assert_eq!(
            convert.subcommand("webp").unwrap().option("lossless").unwrap().default,
            json!(true)
        );
        assert!(tree.option("unknown").is_none());
        assert_eq!(tree.option("scale").unwrap().declared_default(), &json!(4));
    }

    #[test]
    fn test_flatten_then_update_reproduces_defaults() {
        let source = {
            let mut tree = sample_tree();
            tree.update_from_flattened(&object(json!({
                "input_folder": "/data",
                "convert.quality": 10,
                "purge.purge_all": true
            })));
            tree
        };

        let mut copy = sample_tree();
        copy.update_from_flattened(&flatten(&source.get_defaults(), '.'));
        assert_eq!(copy.get_defaults(), source.get_defaults());
    }

    #[test]
    fn test_restore_declared_defaults() {
        let mut tree = sample_tree();
        tree.update_from_flattened(&object(json!({"scale": 8, "convert.quality": 1})));
        tree.restore_declared_defaults();
        assert_eq!(tree.get_defaults(), sample_tree().get_defaults());
    }

    #[test]
    fn test_reset_brings_back_required() {
        let mut tree = sample_tree();
        let snapshot = tree.disable_required();
        tree.update_from_flattened(&object(json!({"input_folder": "/data"})));
        tree.reenable_required(&snapshot);
        assert!(!tree.option("input_folder").unwrap().required);

        tree.reset();
        assert_eq!(required_flags(&tree), required_flags(&sample_tree()));
        assert_eq!(tree.get_defaults(), sample_tree().get_defaults());
    }

    #[test]
    fn test_disable_required_records_by_default_availability() {
        let mut tree = sample_tree();
        tree.update_from_flattened(&object(json!({"input_folder": "/data"})));

        let snapshot = tree.disable_required();

        assert!(required_flags(&tree).iter().all(|(_, required)| !required));
        assert_eq!(snapshot.waived, vec!["input_folder".to_string()]);
        assert!(snapshot.still_required.is_empty());
        assert_eq!(
            snapshot.still_required_keys(),
            vec!["convert.extension".to_string(), "convert.webp.lossless".to_string()]
        );
        // `purge` has nothing required and is left out.
        assert_eq!(snapshot.subcommands.len(), 1);
    }

    #[test]
    fn test_disable_then_reenable_is_idempotent() {
        let mut tree = sample_tree();
        tree.update_from_flattened(&object(json!({
            "input_folder": "/data",
            "convert.webp.lossless": true
        })));
        let before = required_flags(&tree);

        let snapshot = tree.disable_required();
        tree.reenable_required(&snapshot);

        assert_eq!(required_flags(&tree), before);
    }

    #[test]
    fn test_reenable_keeps_options_satisfied_in_between() {
        let mut tree = sample_tree();
        let snapshot = tree.disable_required();
        assert!(snapshot.still_required.contains(&"input_folder".to_string()));

        // A value shows up for input_folder between the two calls.
        tree.update_from_flattened(&object(json!({"input_folder": "/data"})));
        tree.reenable_required(&snapshot);

        assert!(!tree.option("input_folder").unwrap().required);
        assert!(tree.subcommand("convert").unwrap().option("extension").unwrap().required);
    }

    #[test]
    fn test_resolve_merges_selected_child_over_root() {
        let mut tree = sample_tree();
        tree.update_from_flattened(&object(json!({"convert.quality": 75})));

        let parsed = ParsedLevel {
            supplied: object(json!({"input_folder": "/in"})),
            subcommand: Some((
                "convert".to_string(),
                Box::new(ParsedLevel {
                    supplied: object(json!({"extension": "png"})),
                    subcommand: None,
                }),
            )),
        };
        let namespace = tree.resolve(&parsed);

        assert_eq!(namespace.get("input_folder"), Some(&json!("/in")));
        assert_eq!(namespace.get("scale"), Some(&json!(4)));
        assert_eq!(namespace.get("quality"), Some(&json!(75)));
        assert_eq!(namespace.get("extension"), Some(&json!("png")));
        assert!(!namespace.contains_key("purge_all"));
        assert_eq!(namespace.subcommand(), Some("convert"));
    }

    #[test]
    fn test_resolve_without_subcommand_only_root_keys() {
        let tree = sample_tree();
        let namespace = tree.resolve(&ParsedLevel::default());
        assert_eq!(namespace.len(), 2);
        assert_eq!(namespace.subcommand(), None);
    }

    #[test]
    fn test_missing_required_follows_selected_chain() {
        let tree = sample_tree();
        let parsed = ParsedLevel {
            supplied: Map::new(),
            subcommand: Some((
                "convert".to_string(),
                Box::new(ParsedLevel {
                    supplied: object(json!({"extension": "png"})),
                    subcommand: Some(("webp".to_string(), Box::new(ParsedLevel::default()))),
                }),
            )),
        };
        assert_eq!(
            tree.missing_required(&parsed),
            vec!["input_folder".to_string(), "convert.webp.lossless".to_string()]
        );
    }

    #[test]
    fn test_missing_required_satisfied_by_truthy_default() {
        let mut tree = sample_tree();
        tree.update_from_flattened(&object(json!({"input_folder": "/data"})));
        assert!(tree.missing_required(&ParsedLevel::default()).is_empty());

        tree.update_from_flattened(&object(json!({"input_folder": ""})));
        assert_eq!(
            tree.missing_required(&ParsedLevel::default()),
            vec!["input_folder".to_string()]
        );
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{} should be falsy", falsy);
        }
        for truthy in [json!(true), json!(-1), json!(0.5), json!("x"), json!([0]), json!({"a": null})] {
            assert!(is_truthy(&truthy), "{} should be truthy", truthy);
        }
    }
}
