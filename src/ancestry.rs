//! Path-derived page hierarchy.
//!
//! The resolver groups participating files by directory, sorts every group,
//! and attaches an [`Ancestry`] node to each file so layouts can render
//! navigation, breadcrumbs and sub-page lists.
//!
//! ## Ordering
//!
//! Within a directory, files sort by:
//!
//! 1. the *sorts-first* glob (typically `**/index.{html,md,hbs,md.hbs}`):
//!    matching files lead;
//! 2. each `sort_by` key ascending (e.g. `order_id`, then `title`), with
//!    missing values after present ones; the first key that differs decides;
//! 3. the path string, so the order is total and deterministic.
//!
//! ## Links
//!
//! ```text
//! index.md              parent: none        children: [contact.md, about/index.md]
//! contact.md            parent: index.md
//! about/index.md        parent: index.md    children: [about/team.md]
//! about/team.md         parent: about/index.md
//! ```
//!
//! The first sorts-first file of a directory is that directory's *index*.
//! Ordinary files hang under the index of their own directory; an index hangs
//! under the index one directory up. A directory with no index leaves its
//! files with `parent: None`, which is not an error. Siblings and
//! `previous`/`next` come from the sorted directory group.

use crate::files::Files;
use crate::glob::Glob;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AncestryError {
    #[error("cannot place `{0}` in the page tree: path has an empty segment")]
    InvalidPath(String),
    #[error("cyclic parent chain detected at `{0}`")]
    Cycle(String),
}

/// A file's position in the page tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ancestry {
    pub parent: Option<String>,
    pub children: Vec<String>,
    /// Other files of the same directory, in sort order.
    pub siblings: Vec<String>,
    pub previous: Option<String>,
    pub next: Option<String>,
    /// The sorted top-level group.
    pub root: Vec<String>,
}

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct AncestryOptions {
    pub sort_by: Vec<String>,
    pub sort_files_first: Glob,
    /// Only paths matching this glob take part in the tree.
    pub participants: Glob,
}

/// Snapshot of one participating file, taken before any node is written.
struct Entry {
    path: String,
    dir: String,
    first: bool,
    keys: Vec<Option<Value>>,
}

/// Parent directory of a path or directory; top level is `""`.
fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Rank for values of different JSON types: numbers, strings, booleans, rest.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        _ => 3,
    }
}

/// Compare two sort-key values; a missing value sorts after any present one.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => type_rank(a)
                .cmp(&type_rank(b))
                .then_with(|| a.to_string().cmp(&b.to_string())),
        },
    }
}

fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    b.first
        .cmp(&a.first)
        .then_with(|| {
            a.keys
                .iter()
                .zip(&b.keys)
                .map(|(x, y)| compare_values(x.as_ref(), y.as_ref()))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.path.cmp(&b.path))
}

/// Compute and attach ancestry for every participating file.
///
/// Returns the number of files placed in the tree. Non-participating files
/// lose any ancestry left over from an earlier run.
pub fn resolve(files: &mut Files, options: &AncestryOptions) -> Result<usize, AncestryError> {
    let mut nodes = compute(files, options)?;
    let count = nodes.len();
    for (path, file) in files.iter_mut() {
        file.metadata.set_ancestry(nodes.remove(path));
    }
    debug!("resolved ancestry for {count} files");
    Ok(count)
}

/// Compute ancestry nodes from a consistent snapshot without mutating `files`.
pub fn compute(
    files: &Files,
    options: &AncestryOptions,
) -> Result<HashMap<String, Ancestry>, AncestryError> {
    let mut entries = Vec::new();
    for (path, file) in files.iter() {
        if !options.participants.is_match(path) {
            continue;
        }
        if path.is_empty() || path.split('/').any(str::is_empty) {
            return Err(AncestryError::InvalidPath(path.to_string()));
        }
        entries.push(Entry {
            path: path.to_string(),
            dir: parent_dir(path).to_string(),
            first: options.sort_files_first.is_match(path),
            keys: options
                .sort_by
                .iter()
                .map(|k| file.metadata.get(k).cloned())
                .collect(),
        });
    }

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, entry) in entries.iter().enumerate() {
        groups.entry(entry.dir.as_str()).or_default().push(i);
    }
    for group in groups.values_mut() {
        group.sort_by(|&a, &b| compare_entries(&entries[a], &entries[b]));
    }

    let index_of: HashMap<&str, usize> = groups
        .iter()
        .filter_map(|(dir, group)| {
            group
                .iter()
                .copied()
                .find(|&i| entries[i].first)
                .map(|i| (*dir, i))
        })
        .collect();

    // Index files of immediate subdirectories, keyed by the enclosing directory.
    let mut sub_indexes: HashMap<&str, Vec<usize>> = HashMap::new();
    for (&dir, &i) in &index_of {
        if dir.is_empty() {
            continue;
        }
        sub_indexes.entry(parent_dir(dir)).or_default().push(i);
    }
    for list in sub_indexes.values_mut() {
        list.sort_by(|&a, &b| compare_entries(&entries[a], &entries[b]));
    }

    let path_of = |i: usize| entries[i].path.clone();
    let root: Vec<String> = groups
        .get("")
        .map(|g| g.iter().copied().map(path_of).collect())
        .unwrap_or_default();

    let mut parents: HashMap<usize, usize> = HashMap::new();
    let mut nodes = HashMap::with_capacity(entries.len());
    for (dir, group) in &groups {
        let own_index = index_of.get(dir).copied();
        for (pos, &i) in group.iter().enumerate() {
            let is_index = own_index == Some(i);
            let parent = if is_index {
                if dir.is_empty() {
                    None
                } else {
                    index_of.get(parent_dir(dir)).copied()
                }
            } else {
                own_index
            };
            if let Some(p) = parent {
                parents.insert(i, p);
            }

            let children = if is_index {
                group
                    .iter()
                    .copied()
                    .filter(|&c| c != i)
                    .chain(sub_indexes.get(dir).into_iter().flatten().copied())
                    .map(path_of)
                    .collect()
            } else {
                Vec::new()
            };

            nodes.insert(
                entries[i].path.clone(),
                Ancestry {
                    parent: parent.map(path_of),
                    children,
                    siblings: group
                        .iter()
                        .copied()
                        .filter(|&s| s != i)
                        .map(path_of)
                        .collect(),
                    previous: pos.checked_sub(1).map(|p| path_of(group[p])),
                    next: group.get(pos + 1).copied().map(path_of),
                    root: root.clone(),
                },
            );
        }
    }

    check_acyclic(&parents, entries.len(), |i| entries[i].path.clone())?;
    Ok(nodes)
}

/// Walk every parent chain; a chain longer than the file count is a cycle.
fn check_acyclic(
    parents: &HashMap<usize, usize>,
    count: usize,
    path_of: impl Fn(usize) -> String,
) -> Result<(), AncestryError> {
    for &start in parents.keys() {
        let mut current = start;
        let mut steps = 0;
        while let Some(&next) = parents.get(&current) {
            steps += 1;
            if next == start || steps > count {
                return Err(AncestryError::Cycle(path_of(start)));
            }
            current = next;
        }
    }
    Ok(())
}
