// src/core/store.rs

//! # Persistent Store
//!
//! [`ConfigStore`] is a string-keyed mapping bound to a backing file. It loads from and
//! saves to that file through a [`FormatHandler`], and can optionally save after every
//! mutation. There is no locking: two processes writing the same file race.

use crate::constants::KEY_SEPARATOR;
use crate::core::format::{Format, FormatError, FormatHandler};
use crate::core::parser_tree;
use crate::models::Namespace;
use serde_json::{Map, Value};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while persisting a [`ConfigStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading, writing or (de)serializing the backing file failed.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// The backing file did not exist and could not be created.
    #[error("Could not create config file '{path}': {source}")]
    Create {
        path: String,
        #[source]
        source: FormatError,
    },
}

/// Construction options for [`ConfigStore::open`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Initial contents, applied before anything is read from disk.
    pub initial: Map<String, Value>,
    /// Forces a format; by default it is picked from the file extension.
    pub format: Option<Format>,
    /// If the backing file does not exist yet, write `initial` to it right away.
    pub autofill: bool,
    /// Save after every `insert`, `remove`, `update` and dotted mutation.
    pub save_on_change: bool,
    /// Sort top-level keys before each save.
    pub sort_on_save: bool,
    /// Skip the initial load.
    pub start_empty: bool,
}

/// A mapping from key to JSON/TOML-representable value, persisted in one file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    contents: Map<String, Value>,
    handler: FormatHandler,
    save_on_change: bool,
    sort_on_save: bool,
}

impl ConfigStore {
    /// Creates an empty store for `path` without touching the filesystem.
    /// The format follows the file extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = Format::from_path(&path);
        Self::with_format(path, format)
    }

    /// Like [`new`](Self::new), with an explicit format.
    pub fn with_format(path: impl Into<PathBuf>, format: Format) -> Self {
        Self {
            contents: Map::new(),
            handler: FormatHandler::new(format, path),
            save_on_change: false,
            sort_on_save: false,
        }
    }

    /// Creates a store and, unless `start_empty` is set, loads it from disk.
    pub fn open(path: impl Into<PathBuf>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.into();
        let format = options.format.unwrap_or_else(|| Format::from_path(&path));
        let mut store = Self::with_format(path, format)
            .save_on_change(options.save_on_change)
            .sort_on_save(options.sort_on_save);
        store.contents = options.initial;

        if options.autofill && !store.path().exists() {
            store.save().map_err(|e| match e {
                StoreError::Format(source) => StoreError::Create {
                    path: store.path().display().to_string(),
                    source,
                },
                other => other,
            })?;
        }
        if !options.start_empty {
            store.load()?;
        }
        Ok(store)
    }

    /// Save after every mutation.
    pub fn save_on_change(mut self, enabled: bool) -> Self {
        self.save_on_change = enabled;
        self
    }

    /// Sort top-level keys before each save.
    pub fn sort_on_save(mut self, enabled: bool) -> Self {
        self.sort_on_save = enabled;
        self
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        self.handler.path()
    }

    /// The format of the backing file.
    pub fn format(&self) -> Format {
        self.handler.format()
    }

    /// Points the store at a new backing file. Nothing is read or written until the
    /// next `load` or `save`.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.handler.set_path(path);
        self
    }

    /// Merges the backing file into memory, overwriting keys it defines.
    ///
    /// A missing file is a first run: it is created from the current contents. A file
    /// that exists but cannot be read or parsed is reported with a warning and leaves
    /// the in-memory contents untouched.
    pub fn load(&mut self) -> Result<&mut Self, StoreError> {
        if !self.path().exists() {
            log::debug!(
                "Config file '{}' not found. Creating it.",
                self.path().display()
            );
            self.save().map_err(|e| match e {
                StoreError::Format(source) => StoreError::Create {
                    path: self.path().display().to_string(),
                    source,
                },
                other => other,
            })?;
            return Ok(self);
        }

        match self.handler.load() {
            Ok(loaded) => {
                log::trace!(
                    "Loaded {} top-level keys from '{}'",
                    loaded.len(),
                    self.path().display()
                );
                self.contents.extend(loaded);
            }
            Err(FormatError::Read { source, .. }) => {
                log::warn!(
                    t!("store.warn.unreadable"),
                    path = self.path().display(),
                    error = source
                );
            }
            Err(e) => {
                log::warn!(
                    t!("store.warn.load_failed"),
                    path = self.path().display(),
                    error = e
                );
            }
        }
        Ok(self)
    }

    /// Writes the store's own contents to the backing file.
    pub fn save(&self) -> Result<(), StoreError> {
        self.save_contents(&self.contents)
    }

    /// Writes `contents` (not necessarily the store's own) to the backing file.
    pub fn save_contents(&self, contents: &Map<String, Value>) -> Result<(), StoreError> {
        if self.sort_on_save {
            let mut entries: Vec<(&String, &Value)> = contents.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            self.handler.save(&sorted)?;
        } else {
            self.handler.save(contents)?;
        }
        Ok(())
    }

    /// Whether `value` could be written by this store's format.
    pub fn try_serialize(&self, value: &Value) -> bool {
        self.handler.try_serialize(value)
    }

    /// Inserts a top-level key, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Value>, StoreError> {
        let previous = self.contents.insert(key.into(), value);
        self.autosave()?;
        Ok(previous)
    }

    /// Removes a top-level key.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, StoreError> {
        let removed = self.contents.shift_remove(key);
        self.autosave()?;
        Ok(removed)
    }

    /// Merges `other` over the contents, overwriting keys it defines.
    pub fn update(&mut self, other: Map<String, Value>) -> Result<(), StoreError> {
        self.contents.extend(other);
        self.autosave()?;
        Ok(())
    }

    /// Writes every entry at its dotted path and saves once, whatever `save_on_change`
    /// says. Nothing is written when `entries` is empty. Returns the number of entries.
    pub fn seed(&mut self, entries: Map<String, Value>) -> Result<usize, StoreError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let count = entries.len();
        for (key, value) in entries {
            insert_dotted(&mut self.contents, &key, value);
        }
        self.save()?;
        Ok(count)
    }

    /// Empties the store in memory. Call `save` to persist the result.
    pub fn clear(&mut self) {
        self.contents.clear();
    }

    /// Writes `value` at a dotted path, creating intermediate mappings as needed.
    pub fn insert_dotted(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        insert_dotted(&mut self.contents, key, value);
        self.autosave()?;
        Ok(())
    }

    /// Removes the value at a dotted path, pruning mappings the removal leaves empty.
    pub fn remove_dotted(&mut self, key: &str) -> Result<Option<Value>, StoreError> {
        let removed = remove_dotted(&mut self.contents, key);
        if removed.is_some() {
            self.autosave()?;
        }
        Ok(removed)
    }

    /// The contents as dotted keys.
    pub fn flattened(&self) -> Map<String, Value> {
        parser_tree::flatten(&self.contents, KEY_SEPARATOR)
    }

    /// The nested contents.
    pub fn contents(&self) -> &Map<String, Value> {
        &self.contents
    }

    /// A copy of the contents as a [`Namespace`].
    pub fn namespace(&self) -> Namespace {
        Namespace::from_map(self.contents.clone())
    }

    fn autosave(&self) -> Result<bool, StoreError> {
        if self.save_on_change {
            self.save()?;
            return Ok(true);
        }
        Ok(false)
    }
}

impl Deref for ConfigStore {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.contents
    }
}

/// Writes `value` into `map` at a dotted path. A non-mapping value sitting where an
/// intermediate mapping is needed gets replaced.
pub fn insert_dotted(map: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once(KEY_SEPARATOR) {
        None => {
            map.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                log::debug!("Replacing non-mapping value at '{}' with a mapping", head);
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_dotted(inner, rest, value);
            }
        }
    }
}

/// Removes the value at a dotted path from `map`. Mappings emptied by the removal are
/// dropped as well.
pub fn remove_dotted(map: &mut Map<String, Value>, key: &str) -> Option<Value> {
    match key.split_once(KEY_SEPARATOR) {
        None => map.shift_remove(key),
        Some((head, rest)) => {
            let Some(Value::Object(inner)) = map.get_mut(head) else {
                return None;
            };
            let removed = remove_dotted(inner, rest);
            if removed.is_some() && inner.is_empty() {
                map.shift_remove(head);
            }
            removed
        }
    }
}
