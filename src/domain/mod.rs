//! Domain: a directory-rooted namespace holding packages and its own
//! persisted configuration and state.
//!
//! All durable state lives under `<domain>/etc/ssm.d/` as plain files and
//! per-state symlink directories; membership is derived from the filesystem
//! at call time and mutated through the `add_*`/`remove_*` helpers so the
//! on-disk layout stays the single source of truth.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::Config;
use crate::fsops;
use crate::package::{Package, split_name};
use crate::{DEFAULT_DOMAIN_LABEL, DEFAULT_REPO_SOURCE, VERSION_STRING, version_major};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageState {
    Installed,
    Published,
    Broken,
}

#[derive(Debug, Clone)]
pub struct Domain {
    path: PathBuf,
}

impl Domain {
    /// A domain handle for `path` (existent or not). The path is resolved to
    /// an absolute one so state symlinks work from anywhere.
    pub fn new(path: &Path) -> Self {
        let path = fs::canonicalize(path).unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        });
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state_dir(&self) -> PathBuf {
        self.path.join("etc/ssm.d")
    }

    fn installed_dir(&self) -> PathBuf {
        self.state_dir().join("installed")
    }

    fn published_dir(&self) -> PathBuf {
        self.state_dir().join("published")
    }

    fn published_platform_dir(&self, platform: &str) -> PathBuf {
        self.published_dir().join(platform)
    }

    fn broken_dir(&self) -> PathBuf {
        self.state_dir().join("broken")
    }

    fn label_path(&self) -> PathBuf {
        self.state_dir().join("label")
    }

    fn sources_path(&self) -> PathBuf {
        self.state_dir().join("sources.list")
    }

    fn subdomains_path(&self) -> PathBuf {
        self.state_dir().join("subdomains")
    }

    fn version_path(&self) -> PathBuf {
        self.state_dir().join("version")
    }

    fn frozen_path(&self) -> PathBuf {
        self.state_dir().join("frozen")
    }

    pub fn profile_path(&self) -> PathBuf {
        self.state_dir().join("profile")
    }

    pub fn login_path(&self) -> PathBuf {
        self.state_dir().join("login")
    }

    // state

    /// True iff the path carries the minimal domain markers.
    pub fn is_domain(&self) -> bool {
        self.state_dir().is_dir() && self.version_path().is_file()
    }

    /// True iff the domain's stored major version matches the running
    /// tool's.
    pub fn is_compatible(&self) -> bool {
        match self.get_version() {
            Ok(version) => version.first().map(String::as_str) == Some(version_major()),
            Err(_) => false,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen_path().exists()
    }

    pub(crate) fn ensure_unfrozen(&self) -> Result<()> {
        if self.is_frozen() {
            bail!("domain is frozen");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(domain = %self.path.display()))]
    pub fn freeze(&self) -> Result<()> {
        self.ensure_unfrozen()?;
        fsops::touch(&self.frozen_path())
    }

    #[tracing::instrument(skip(self), fields(domain = %self.path.display()))]
    pub fn unfreeze(&self) -> Result<()> {
        fsops::remove(&self.frozen_path())
    }

    // lifecycle

    /// Materialize the domain skeleton and support files. Fails if the
    /// target already is a domain.
    #[tracing::instrument(skip(self), fields(domain = %self.path.display()))]
    pub fn create(&self, label: &str, sources: &str) -> Result<()> {
        if self.is_domain() {
            bail!("cannot create over an existing domain");
        }
        fsops::mkdirs(&self.installed_dir())?;
        fsops::mkdirs(&self.published_dir())?;
        fsops::mkdirs(&self.broken_dir())?;
        fsops::write_string(&self.label_path(), label)?;
        fsops::write_string(&self.sources_path(), sources)?;
        self.write_support()
    }

    /// Rewrite the version stamp and support files to the running tool's
    /// version, recreating any missing state directories.
    #[tracing::instrument(skip(self), fields(domain = %self.path.display()))]
    pub fn update_support(&self) -> Result<()> {
        self.ensure_unfrozen()?;
        fsops::mkdirs(&self.installed_dir())?;
        fsops::mkdirs(&self.published_dir())?;
        fsops::mkdirs(&self.broken_dir())?;
        self.write_support()
    }

    fn write_support(&self) -> Result<()> {
        fsops::write_string(&self.version_path(), &format!("{VERSION_STRING}\n"))?;
        let profile = format!(
            "# domain support file; written by ssm {VERSION_STRING}\n\
             SSM_DOMAIN_HOME=\"{}\"\nexport SSM_DOMAIN_HOME\n",
            self.path.display()
        );
        fsops::write_string(&self.profile_path(), &profile)?;
        let login = format!(
            "# domain support file; written by ssm {VERSION_STRING}\n\
             setenv SSM_DOMAIN_HOME \"{}\"\n",
            self.path.display()
        );
        fsops::write_string(&self.login_path(), &login)
    }

    // persisted attributes

    pub fn get_label(&self) -> String {
        fsops::read_string_or(&self.label_path(), DEFAULT_DOMAIN_LABEL)
            .trim_end()
            .to_string()
    }

    pub fn set_label(&self, label: &str) -> Result<()> {
        self.ensure_unfrozen()?;
        fsops::write_string(&self.label_path(), label)
    }

    /// Raw sources setting: newline-separated `"<url> [component ...]"`
    /// entries.
    pub fn get_sources(&self) -> String {
        fsops::read_string_or(&self.sources_path(), DEFAULT_REPO_SOURCE)
    }

    pub fn set_sources(&self, sources: &str) -> Result<()> {
        self.ensure_unfrozen()?;
        fsops::write_string(&self.sources_path(), sources)
    }

    pub fn get_subdomains(&self) -> Vec<PathBuf> {
        fsops::read_string_or(&self.subdomains_path(), "")
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// Replace the ordered subdomain chain atomically (write-new-then-rename
    /// so a failure never leaves a partial list).
    pub fn set_subdomains(&self, subdomains: &[PathBuf]) -> Result<()> {
        self.ensure_unfrozen()?;
        let mut text = subdomains
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        let new_path = self.subdomains_path().with_extension("new");
        fsops::write_string(&new_path, &text)?;
        fsops::rename(&new_path, &self.subdomains_path())
    }

    pub fn get_version(&self) -> Result<Vec<String>> {
        let text = fs::read_to_string(self.version_path())
            .with_context(|| format!("cannot read domain version ({})", self.path.display()))?;
        Ok(text.trim().split('.').map(str::to_string).collect())
    }

    // package sets

    /// Installed package names, optionally glob-filtered, sorted.
    pub fn get_package_names(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let pattern = pattern
            .map(glob::Pattern::new)
            .transpose()
            .context("bad package name pattern")?;
        let mut names = state_entry_names(&self.installed_dir())?;
        if let Some(pattern) = pattern {
            names.retain(|name| pattern.matches(name));
        }
        Ok(names)
    }

    /// Name→package map for one state; `published` is scoped to a platform.
    pub fn get_packages_with_state(
        &self,
        state: PackageState,
        platform: Option<&str>,
    ) -> Result<BTreeMap<String, Package<'_>>> {
        let dir = match state {
            PackageState::Installed => self.installed_dir(),
            PackageState::Broken => self.broken_dir(),
            PackageState::Published => {
                let platform =
                    platform.context("platform required for published package listing")?;
                self.published_platform_dir(platform)
            }
        };
        let names = if dir.is_dir() {
            state_entry_names(&dir)?
        } else {
            Vec::new()
        };
        names
            .into_iter()
            .map(|name| Ok((name.clone(), Package::new(self, &name)?)))
            .collect()
    }

    /// Compact state flags for listings: I(nstalled), P(ublished), B(roken).
    pub fn get_package_state(&self, name: &str, platform: Option<&str>) -> Result<String> {
        let mut state = String::new();
        if self.is_installed(name) {
            state.push('I');
        }
        if self.is_published(name, platform)? {
            state.push('P');
        }
        if self.is_broken(name) {
            state.push('B');
        }
        Ok(state)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed_dir().join(name).symlink_metadata().is_ok()
    }

    pub fn is_broken(&self, name: &str) -> bool {
        self.broken_dir().join(name).symlink_metadata().is_ok()
    }

    /// Published membership; the platform defaults to the package's own.
    pub fn is_published(&self, name: &str, platform: Option<&str>) -> Result<bool> {
        let platform = match platform {
            Some(platform) => platform.to_string(),
            None => split_name(name)?.2.to_string(),
        };
        Ok(self
            .published_platform_dir(&platform)
            .join(name)
            .symlink_metadata()
            .is_ok())
    }

    /// Targets of the installed state symlinks.
    pub fn get_installed(&self) -> Result<Vec<PathBuf>> {
        fsops::symlink_targets(&self.installed_dir())
    }

    /// Targets of the published state symlinks for one platform.
    pub fn get_published(&self, platform: &str) -> Result<Vec<PathBuf>> {
        let dir = self.published_platform_dir(platform);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        fsops::symlink_targets(&dir)
    }

    pub fn get_broken(&self) -> Result<Vec<PathBuf>> {
        let dir = self.broken_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        fsops::symlink_targets(&dir)
    }

    /// Platforms that have a published tree.
    pub fn get_published_platforms(&self) -> Vec<String> {
        let dir = self.published_dir();
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut platforms: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        platforms.sort();
        platforms
    }

    /// Published entries whose symlink target no longer exists. Cross-domain
    /// publishes can dangle when the source domain drops the package.
    pub fn get_dangling_published(&self, platform: &str) -> Result<Vec<String>> {
        let dir = self.published_platform_dir(platform);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut dangling = Vec::new();
        for name in state_entry_names(&dir)? {
            let link = dir.join(&name);
            if fs::read_link(&link).is_ok() && !link.exists() {
                dangling.push(name);
            }
        }
        Ok(dangling)
    }

    // state set mutators

    pub fn add_installed(&self, package_path: &Path) -> Result<()> {
        add_state_link(&self.installed_dir(), package_path)
    }

    pub fn remove_installed(&self, package_path: &Path) -> Result<()> {
        remove_state_link(&self.installed_dir(), package_path)
    }

    pub fn add_broken(&self, package_path: &Path) -> Result<()> {
        add_state_link(&self.broken_dir(), package_path)
    }

    pub fn remove_broken(&self, package_path: &Path) -> Result<()> {
        remove_state_link(&self.broken_dir(), package_path)
    }

    // publish/unpublish

    /// Publish `package` (possibly from another domain) under `platform`.
    /// A failing pre-publish hook aborts before any symlink exists.
    #[tracing::instrument(skip(self, config, package), fields(domain = %self.path.display(), package = %package.name()))]
    pub fn publish_package(
        &self,
        config: &Config,
        package: &Package<'_>,
        platform: &str,
    ) -> Result<()> {
        self.ensure_unfrozen()?;
        package.execute_script(config, "pre-publish", Some(self))?;

        let dir = self.published_platform_dir(platform);
        fsops::mkdirs(&dir)?;
        let link = dir.join(package.name());
        fsops::remove(&link)?;
        fsops::symlink(package.path(), &link)?;

        package.execute_script(config, "post-publish", Some(self))
    }

    /// Mirror of publish. A failing pre-unpublish hook aborts before the
    /// symlink is removed, unless forced.
    #[tracing::instrument(skip(self, config, package), fields(domain = %self.path.display(), package = %package.name()))]
    pub fn unpublish_package(
        &self,
        config: &Config,
        package: &Package<'_>,
        platform: &str,
    ) -> Result<()> {
        self.ensure_unfrozen()?;
        if let Err(err) = package.execute_script(config, "pre-unpublish", Some(self)) {
            if !config.force {
                return Err(err);
            }
            config.print_verbose("pre-unpublish failed; continuing because of --force");
        }

        fsops::remove(&self.published_platform_dir(platform).join(package.name()))?;

        package.execute_script(config, "post-unpublish", Some(self))
    }
}

fn add_state_link(dir: &Path, target: &Path) -> Result<()> {
    let name = target
        .file_name()
        .with_context(|| format!("bad package path ({})", target.display()))?;
    fsops::mkdirs(dir)?;
    let link = dir.join(name);
    fsops::remove(&link)?;
    fsops::symlink(target, &link)
}

fn remove_state_link(dir: &Path, target: &Path) -> Result<()> {
    let name = target
        .file_name()
        .with_context(|| format!("bad package path ({})", target.display()))?;
    fsops::remove(&dir.join(name))
}

fn state_entry_names(dir: &Path) -> Result<Vec<String>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}
