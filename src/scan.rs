//! Source tree loading.
//!
//! Walks the source directory and loads every file into a [`Files`]
//! collection before the first stage runs. Paths are recorded relative to
//! the source root with `/` separators. Files matching the configured ignore
//! globs never enter the collection.
//!
//! Text files (see [`TEXT_EXTENSIONS`]) have their YAML frontmatter split off
//! into metadata here; every later stage sees only the body. Everything else
//! is loaded as raw bytes with empty metadata.

use crate::files::{File, Files, FilesError, normalize_path};
use crate::frontmatter::{self, FrontmatterError};
use crate::glob::GlobSet;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Source directory not found: {0}")]
    SourceMissing(PathBuf),
    #[error("{path}: {source}")]
    Frontmatter {
        path: String,
        #[source]
        source: FrontmatterError,
    },
    #[error(transparent)]
    Path(#[from] FilesError),
}

/// Extensions whose contents may carry frontmatter.
pub const TEXT_EXTENSIONS: &[&str] = &["md", "hbs", "html", "htm", "fakechild", "txt"];

pub fn is_text_path(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.')
        .map(|(_, ext)| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load the source tree rooted at `source`.
pub fn scan(source: &Path, ignore: &GlobSet) -> Result<Files, ScanError> {
    if !source.is_dir() {
        return Err(ScanError::SourceMissing(source.to_path_buf()));
    }

    let mut files = Files::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| ScanError::SourceMissing(source.to_path_buf()))?;
        let rel = relative_key(rel)?;

        if ignore.is_match(&rel) {
            debug!("ignoring {rel}");
            continue;
        }

        let bytes = fs::read(entry.path())?;
        let file = load_file(&rel, bytes)?;
        files.insert(&rel, file)?;
    }

    debug!("loaded {} files from {}", files.len(), source.display());
    Ok(files)
}

/// Build a collection key from a path relative to the source root.
fn relative_key(rel: &Path) -> Result<String, FilesError> {
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    normalize_path(&joined)
}

/// Turn raw bytes into a [`File`], splitting frontmatter from text files.
pub fn load_file(path: &str, bytes: Vec<u8>) -> Result<File, ScanError> {
    if !is_text_path(path) {
        return Ok(File::new(bytes));
    }
    let Ok(text) = std::str::from_utf8(&bytes) else {
        return Ok(File::new(bytes));
    };
    match frontmatter::parse(text) {
        Ok(Some((metadata, body))) => Ok(File::new(body).with_metadata(metadata)),
        Ok(None) => Ok(File::new(bytes)),
        Err(source) => Err(ScanError::Frontmatter {
            path: path.to_string(),
            source,
        }),
    }
}
