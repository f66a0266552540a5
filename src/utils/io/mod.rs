//! IO utilities for file operations
//!
//! Artifacts are replaced with an all-or-nothing swap: the content is written
//! to a hidden temporary file in the destination directory and then renamed
//! over the target, so readers see either the old or the new file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::util::ensure_directory;
use crate::error::{DaioeError, Result};

/// Temporary sibling of `target` used while writing
#[must_use]
pub fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    target.with_file_name(format!(".{name}.tmp-{}", std::process::id()))
}

/// Write `target` through `write`, replacing any previous file atomically.
///
/// The temporary file is removed if `write` fails, leaving `target` as it was.
pub fn write_atomically<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_directory(parent, "artifact output")?;
    }

    let tmp = temp_path_for(target);
    let result = (|| {
        let file = File::create(&tmp)
            .map_err(|e| DaioeError::io("Failed to create temporary file", e).with_path(&tmp))?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer
            .flush()
            .map_err(|e| DaioeError::io("Failed to flush temporary file", e).with_path(&tmp))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| DaioeError::io("Failed to sync temporary file", e).with_path(&tmp))?;
        fs::rename(&tmp, target)
            .map_err(|e| DaioeError::io("Failed to replace artifact", e).with_path(target))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
