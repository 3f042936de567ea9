//! Mostly [`fs`] extensions with extra error messaging.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use camino::Utf8Path;

/// Equivalent to [`fs::create_dir_all`] with better error messages.
pub fn create_dir_all(p: impl AsRef<Path>) -> Result<()> {
    return inner(p.as_ref());

    fn inner(p: &Path) -> Result<()> {
        fs::create_dir_all(p)
            .with_context(|| format!("failed to create directory `{}`", p.display()))?;
        Ok(())
    }
}

/// Remove a file, succeeding if it does not exist.
pub fn remove_file_idempotent(p: &Utf8Path) -> Result<()> {
    match fs::remove_file(p) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other.with_context(|| format!("failed to remove file `{p}`")),
    }
}

/// Remove a directory tree, succeeding if it does not exist.
pub fn remove_dir_all_idempotent(p: &Utf8Path) -> Result<()> {
    match fs::remove_dir_all(p) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other.with_context(|| format!("failed to remove directory `{p}`")),
    }
}
