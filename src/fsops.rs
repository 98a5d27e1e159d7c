//! Thin, logged wrappers over filesystem primitives.
//!
//! Every mutating helper here is traced; tree removal is best-effort under
//! `--force` (failures are reported and swallowed so a partially damaged
//! package can still be cleaned out of the bookkeeping).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Config;

#[tracing::instrument(skip(s))]
pub fn write_string(path: &Path, s: &str) -> Result<()> {
    fs::write(path, s).with_context(|| format!("failed to write {}", path.display()))
}

/// Read a file to a string, falling back to `alt` on any error.
pub fn read_string_or(path: &Path, alt: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|_| alt.to_string())
}

#[tracing::instrument]
pub fn mkdirs(path: &Path) -> Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Remove a file or symlink if present; a missing target is not an error.
#[tracing::instrument]
pub fn remove(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Remove a directory tree if present. Under `--force`, failures are
/// reported verbosely and swallowed.
#[tracing::instrument(skip(config))]
pub fn rmtree(config: &Config, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if let Err(err) = fs::remove_dir_all(path) {
        if config.force {
            config.print_verbose(&format!("rmtree failed; continuing because of --force ({err})"));
        } else {
            return Err(err).with_context(|| format!("failed to remove tree {}", path.display()));
        }
    }
    Ok(())
}

#[tracing::instrument]
pub fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).with_context(|| {
        format!(
            "failed to create symlink {} -> {}",
            link.display(),
            target.display()
        )
    })
}

#[tracing::instrument]
pub fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)
        .with_context(|| format!("failed to rename {} to {}", from.display(), to.display()))
}

#[tracing::instrument]
pub fn touch(path: &Path) -> Result<()> {
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to touch {}", path.display()))?;
    Ok(())
}

/// Targets of all symlinks directly under `path`.
pub fn symlink_targets(path: &Path) -> Result<Vec<PathBuf>> {
    let mut targets = Vec::new();
    for entry in
        fs::read_dir(path).with_context(|| format!("failed to read {}", path.display()))?
    {
        let entry_path = entry?.path();
        if entry_path.is_symlink() {
            targets.push(fs::read_link(&entry_path)?);
        }
    }
    targets.sort();
    Ok(targets)
}
