//! Publishable-path enumeration with symlink-aware traversal.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;

use super::Package;
use crate::fsops;

/// Bound on nested symlink descents; a link that points back into its own
/// parent would otherwise loop (and hit the kernel's symlink resolution
/// limit first). Real directories are not counted.
const MAX_LINK_DEPTH: usize = 32;

/// A directory symlink is traversed as a real directory only when its target
/// carries the `"./"` prefix and `"/."` suffix convention used to share
/// subtrees without duplicating them.
fn is_traversable_link(path: &Path) -> bool {
    let Ok(target) = fs::read_link(path) else {
        return false;
    };
    let target = target.to_string_lossy();
    path.is_dir() && target.starts_with("./") && target.ends_with("/.")
}

/// Collect descendants of `root` in walk order: each level's directories,
/// then its files, then the subtree of each directory.
fn collect_descendants(root: &Path, link_depth: usize, out: &mut Vec<PathBuf>) -> Result<()> {
    if !root.is_dir() || link_depth >= MAX_LINK_DEPTH {
        return Ok(());
    }
    let mut entries: Vec<_> = fs::read_dir(root)
        .with_context(|| format!("failed to read {}", root.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.path();
        let meta = path.symlink_metadata()?;
        if meta.file_type().is_symlink() {
            if is_traversable_link(&path) {
                dirs.push(path);
            } else {
                files.push(path);
            }
        } else if meta.is_dir() {
            dirs.push(path);
        } else if meta.is_file() {
            files.push(path);
        }
    }

    out.extend(dirs.iter().cloned());
    out.extend(files);
    for dir in dirs {
        let is_link = dir.symlink_metadata()?.file_type().is_symlink();
        collect_descendants(&dir, link_depth + usize::from(is_link), out)?;
    }
    Ok(())
}

/// Load an optional anchored pattern; an absent or empty file means no
/// pattern. A pattern that fails to compile is a configuration error.
fn load_pattern(path: &Path) -> Result<Option<Regex>> {
    let text = fsops::read_string_or(path, "");
    let text = text.trim_end();
    if text.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"\A(?:{text})"))
        .map(Some)
        .with_context(|| format!("bad pattern in {}", path.display()))
}

impl Package<'_> {
    fn include_path(&self) -> PathBuf {
        self.path().join(".ssm.d/include")
    }

    fn exclude_path(&self) -> PathBuf {
        self.path().join(".ssm.d/exclude")
    }

    /// Include pattern; `None` means include everything.
    pub fn get_include_re(&self) -> Result<Option<Regex>> {
        load_pattern(&self.include_path())
    }

    /// Exclude pattern; `None` means exclude nothing.
    pub fn get_exclude_re(&self) -> Result<Option<Regex>> {
        load_pattern(&self.exclude_path())
    }

    /// Paths of publishable objects under the requested top-level children.
    ///
    /// A path is kept iff the include pattern matches it and the exclude
    /// pattern does not (both matched from the start of the absolute path).
    #[tracing::instrument(skip(self))]
    pub fn get_publishable_paths(
        &self,
        names: &[String],
        excluded_names: Option<&[String]>,
    ) -> Result<Vec<PathBuf>> {
        let include = self
            .get_include_re()
            .context("bad include and/or exclude")?;
        let exclude = self
            .get_exclude_re()
            .context("bad include and/or exclude")?;
        let keep = |path: &Path| {
            let s = path.to_string_lossy();
            include.as_ref().is_none_or(|re| re.is_match(&s))
                && !exclude.as_ref().is_some_and(|re| re.is_match(&s))
        };

        let mut paths = Vec::new();
        for name in names {
            if excluded_names.is_some_and(|excluded| excluded.iter().any(|e| e == name)) {
                continue;
            }
            let path = self.path().join(name);
            if !keep(&path) {
                continue;
            }
            paths.push(path.clone());
            let mut descendants = Vec::new();
            collect_descendants(&path, 0, &mut descendants)?;
            paths.extend(descendants.into_iter().filter(|p| keep(p)));
        }
        Ok(paths)
    }
}
