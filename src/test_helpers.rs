//! Shared test utilities for the cascade-ssg test suite.
//!
//! Provides collection builders and lookups that panic with a clear message
//! listing what *is* available, so a failing assertion says more than
//! "called `Option::unwrap()` on a `None` value".
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut files = files_from(&[
//!     ("index.md", json!({"order_id": 1})),
//!     ("about/index.md", json!({"title": "About"})),
//! ]);
//! ancestry::resolve(&mut files, &options).unwrap();
//!
//! assert_eq!(ancestry_of(&files, "about/index.md").parent.as_deref(), Some("index.md"));
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::ancestry::Ancestry;
use crate::files::{File, Files, Metadata};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can build into without affecting other
/// tests or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Collection builders
// =========================================================================

/// Build a collection from `(path, metadata)` pairs.
///
/// Every file gets a one-sentence body naming its path.
pub fn files_from(entries: &[(&str, serde_json::Value)]) -> Files {
    let mut files = Files::new();
    for (path, meta) in entries {
        let map = meta
            .as_object()
            .unwrap_or_else(|| panic!("metadata for '{path}' must be a JSON object"))
            .clone();
        let file = File::new(format!("Contents of {path}.")).with_metadata(Metadata::from_map(map));
        files.insert(path, file).unwrap();
    }
    files
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// Find a file by path. Panics if not found.
pub fn find_file<'a>(files: &'a Files, path: &str) -> &'a File {
    files.get(path).unwrap_or_else(|| {
        let paths: Vec<&str> = files.paths().collect();
        panic!("file '{path}' not found. Available: {paths:?}")
    })
}

/// The ancestry node of a file. Panics if the file is missing or has none.
pub fn ancestry_of<'a>(files: &'a Files, path: &str) -> &'a Ancestry {
    find_file(files, path).metadata.ancestry().unwrap_or_else(|| {
        let placed: Vec<&str> = files
            .iter()
            .filter(|(_, f)| f.metadata.ancestry().is_some())
            .map(|(p, _)| p)
            .collect();
        panic!("file '{path}' has no ancestry. Files with ancestry: {placed:?}")
    })
}
