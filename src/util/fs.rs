//! Filesystem helpers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::util::hash::{sha256_file_if_exists, sha256_str};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Write `contents` only if the file is missing or differs.
///
/// Returns `true` when the file was (re)written. An unchanged file keeps its
/// mtime, so downstream compile steps stay fresh.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if sha256_file_if_exists(path)?.as_deref() == Some(sha256_str(contents).as_str()) {
        return Ok(false);
    }
    write_string(path, contents)?;
    Ok(true)
}

/// Copy an artifact into an install directory, keeping its file name.
pub fn install_file(artifact: &Path, dest_dir: &Path) -> Result<()> {
    ensure_dir(dest_dir)?;
    let file_name = artifact
        .file_name()
        .with_context(|| format!("artifact has no file name: {}", artifact.display()))?;
    let dest = dest_dir.join(file_name);
    fs::copy(artifact, &dest).with_context(|| {
        format!(
            "failed to install {} to {}",
            artifact.display(),
            dest.display()
        )
    })?;
    Ok(())
}
