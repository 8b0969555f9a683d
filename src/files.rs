//! The in-memory file collection shared by every pipeline stage.
//!
//! A build loads the source tree into a [`Files`] collection, threads it
//! through each stage in order, and writes whatever is left at the end.
//! Keys are normalized relative paths: `/` separators on every platform, no
//! leading `/`, no `.` or `..` segments. The collection is a `BTreeMap`, so
//! iteration is always in path order; stages that need a different order
//! sort explicitly.
//!
//! ## Metadata
//!
//! Each [`File`] carries a [`Metadata`] map. Frontmatter values, cascade
//! defaults and computed fields all live in the same open map of JSON values,
//! with typed accessors for the well-known keys in [`keys`]. Ancestry is kept
//! in a separate typed slot and only appears under the `ancestry` key when the
//! metadata is exported with [`Metadata::to_json`].

use crate::ancestry::Ancestry;
use rayon::collections::btree_map::IterMut as ParIterMut;
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Well-known metadata keys.
pub mod keys {
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const LAYOUT: &str = "layout";
    pub const STYLESHEET: &str = "stylesheet";
    pub const COPYRIGHT_DATE: &str = "copyright_date";
    pub const ORDER_ID: &str = "order_id";
    pub const NAV_SHOW: &str = "nav_show";
    pub const PARENT_SUBPAGES: &str = "parent_subpages";
    pub const MAIN_PAGE: &str = "main_page";
    pub const NEEDS_LINK_TO_TOP: &str = "needs_link_to_top";
    pub const OVERVIEW_LIST: &str = "overview_list";
    pub const HIDE_PAGE_TITLE: &str = "hide_page_title";
    /// Canonical URI of the built page.
    pub const URI: &str = "uri";
    pub const TOP_LEVEL: &str = "top_level";
    pub const DEPTH: &str = "depth";
    /// Original path of a file the markdown stage moved.
    pub const SOURCE_PATH: &str = "source_path";
    /// Reserved: filled from the ancestry slot on export.
    pub const ANCESTRY: &str = "ancestry";
}

#[derive(Error, Debug, PartialEq)]
pub enum FilesError {
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("cannot move `{from}` to `{to}`: target already exists")]
    AlreadyExists { from: String, to: String },
    #[error("no such file: {0}")]
    NotFound(String),
}

/// Normalize a relative path to the collection's key form.
///
/// - `guide\setup.md` → `guide/setup.md`
/// - `./guide//setup.md` → `guide/setup.md`
/// - `/index.md` → `index.md`
///
/// Empty paths and paths with `..` segments are rejected.
pub fn normalize_path(raw: &str) -> Result<String, FilesError> {
    let unified = raw.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(FilesError::InvalidPath {
                    path: raw.to_string(),
                    reason: "parent-directory segments are not allowed",
                });
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(FilesError::InvalidPath {
            path: raw.to_string(),
            reason: "path is empty",
        });
    }
    Ok(segments.join("/"))
}

/// Open metadata map with typed accessors for the well-known keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    values: BTreeMap<String, Value>,
    ancestry: Option<Ancestry>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            values: map.into_iter().collect(),
            ancestry: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Insert `value` only if `key` is absent. Returns whether it was inserted.
    pub fn insert_default(&mut self, key: &str, value: &Value) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(key.to_string(), value.clone());
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn title(&self) -> Option<&str> {
        self.str(keys::TITLE)
    }

    pub fn description(&self) -> Option<&str> {
        self.str(keys::DESCRIPTION)
    }

    pub fn layout(&self) -> Option<&str> {
        self.str(keys::LAYOUT)
    }

    pub fn order_id(&self) -> Option<f64> {
        self.values.get(keys::ORDER_ID).and_then(Value::as_f64)
    }

    pub fn uri(&self) -> Option<&str> {
        self.str(keys::URI)
    }

    pub fn nav_show(&self) -> bool {
        self.bool(keys::NAV_SHOW).unwrap_or(false)
    }

    pub fn hide_page_title(&self) -> bool {
        self.bool(keys::HIDE_PAGE_TITLE).unwrap_or(false)
    }

    pub fn parent_subpages(&self) -> bool {
        self.bool(keys::PARENT_SUBPAGES).unwrap_or(false)
    }

    pub fn needs_link_to_top(&self) -> bool {
        self.bool(keys::NEEDS_LINK_TO_TOP).unwrap_or(false)
    }

    pub fn main_page(&self) -> bool {
        self.bool(keys::MAIN_PAGE).unwrap_or(false)
    }

    pub fn overview_list(&self) -> bool {
        self.bool(keys::OVERVIEW_LIST).unwrap_or(false)
    }

    pub fn ancestry(&self) -> Option<&Ancestry> {
        self.ancestry.as_ref()
    }

    pub fn set_ancestry(&mut self, ancestry: Option<Ancestry>) {
        self.ancestry = ancestry;
    }

    /// Export as a JSON object, with the ancestry node under [`keys::ANCESTRY`].
    pub fn to_json(&self) -> Value {
        let mut map: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(ancestry) = &self.ancestry {
            let node = serde_json::to_value(ancestry).unwrap_or(Value::Null);
            map.insert(keys::ANCESTRY.to_string(), node);
        }
        Value::Object(map)
    }
}

/// A virtual file: raw contents plus metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct File {
    pub contents: Vec<u8>,
    pub metadata: Metadata,
}

impl File {
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            metadata: Metadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Contents as UTF-8 text, if they are valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.contents).ok()
    }

    pub fn set_text(&mut self, text: String) {
        self.contents = text.into_bytes();
    }
}

/// Path-keyed file collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Files {
    entries: BTreeMap<String, File>,
}

impl Files {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&File> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut File> {
        self.entries.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Insert a file under the normalized form of `path`, replacing any
    /// existing entry.
    pub fn insert(&mut self, path: &str, file: File) -> Result<Option<File>, FilesError> {
        let key = normalize_path(path)?;
        Ok(self.entries.insert(key, file))
    }

    pub fn remove(&mut self, path: &str) -> Option<File> {
        self.entries.remove(path)
    }

    /// Move a file to a new path. Fails if the target is already taken.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), FilesError> {
        let to = normalize_path(to)?;
        if to == from {
            return Ok(());
        }
        if self.entries.contains_key(&to) {
            return Err(FilesError::AlreadyExists {
                from: from.to_string(),
                to,
            });
        }
        let file = self
            .entries
            .remove(from)
            .ok_or_else(|| FilesError::NotFound(from.to_string()))?;
        self.entries.insert(to, file);
        Ok(())
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &File) -> bool) {
        self.entries.retain(|path, file| keep(path, file));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &File)> {
        self.entries.iter().map(|(p, f)| (p.as_str(), f))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut File)> {
        self.entries.iter_mut().map(|(p, f)| (p.as_str(), f))
    }

    /// Parallel mutable iteration for per-file stage work.
    pub fn par_iter_mut(&mut self) -> ParIterMut<'_, String, File> {
        self.entries.par_iter_mut()
    }
}
