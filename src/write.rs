//! Output writing.
//!
//! The final collection is written into a staging directory next to the
//! destination (`build` → `.build.staging`). Only once every file is on disk
//! is the old destination removed and the staging directory renamed into
//! place, so a failed write leaves the previous output untouched.

use crate::files::Files;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid destination: {0}")]
    Destination(PathBuf),
}

/// Sibling staging directory for `destination`.
pub fn staging_dir(destination: &Path) -> Result<PathBuf, WriteError> {
    let name = destination
        .file_name()
        .ok_or_else(|| WriteError::Destination(destination.to_path_buf()))?;
    let mut staged = std::ffi::OsString::from(".");
    staged.push(name);
    staged.push(".staging");
    Ok(destination.with_file_name(staged))
}

/// Replace `destination` with the contents of `files`.
///
/// Returns the number of files written.
pub fn write_output(files: &Files, destination: &Path) -> Result<usize, WriteError> {
    let staging = staging_dir(destination)?;
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }

    match write_tree(files, &staging) {
        Ok(count) => {
            swap_into_place(&staging, destination)?;
            Ok(count)
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!("could not remove {}: {cleanup}", staging.display());
            }
            Err(e)
        }
    }
}

fn write_tree(files: &Files, root: &Path) -> Result<usize, WriteError> {
    fs::create_dir_all(root)?;
    for (path, file) in files.iter() {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &file.contents)?;
        debug!("wrote {path}");
    }
    Ok(files.len())
}

fn swap_into_place(staging: &Path, destination: &Path) -> Result<(), WriteError> {
    if destination.exists() {
        fs::remove_dir_all(destination)?;
    }
    fs::rename(staging, destination)?;
    Ok(())
}
