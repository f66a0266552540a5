//! Utility functions for error handling
//!
//! Filesystem helpers that attach the path and purpose to IO failures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{DaioeError, Result};

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.is_file() {
        return Err(DaioeError::io(
            format!("File not found, needed for: {purpose}"),
            io::Error::from(io::ErrorKind::NotFound),
        )
        .with_path(path));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => "Permission denied - check file permissions".to_string(),
            _ => format!("Failed to open file for: {purpose}"),
        };
        DaioeError::io(context, e).with_path(path)
    })
}

/// Create a directory (and parents) if it does not exist yet
pub fn ensure_directory(path: &Path, purpose: &str) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)
        .map_err(|e| DaioeError::io(format!("Failed to create directory for: {purpose}"), e).with_path(path))
}

/// Find the file in `dir` with extension `ext` whose name has the largest key.
///
/// `key` receives the file stem; files it rejects are skipped. Returns
/// `Ok(None)` if the directory is missing or holds no match.
pub fn latest_file_by<K, F>(dir: &Path, ext: &str, key: F) -> Result<Option<PathBuf>>
where
    K: Ord,
    F: Fn(&str) -> Option<K>,
{
    if !dir.is_dir() {
        return Ok(None);
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| DaioeError::io("Failed to read directory", e).with_path(dir))?;

    let mut latest: Option<(K, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| DaioeError::io("Failed to read directory entry", e).with_path(dir))?;
        let path = entry.path();
        if !path.is_file() || !path.extension().is_some_and(|e| e == ext) {
            continue;
        }
        let Some(k) = path.file_stem().and_then(|n| n.to_str()).and_then(|stem| key(stem)) else {
            continue;
        };
        if latest.as_ref().is_none_or(|(best, _)| k > *best) {
            latest = Some((k, path));
        }
    }

    Ok(latest.map(|(_, path)| path))
}
