//! Package: one `shortname_version_platform` unit under a domain.

mod control;
mod paths;
mod script;

pub use control::parse_control;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use log::debug;

use crate::archive::{self, PackageArchive};
use crate::config::Config;
use crate::domain::Domain;
use crate::fsops;
use crate::users::Owner;

pub struct Package<'a> {
    domain: &'a Domain,
    name: String,
    path: PathBuf,
    short_name: String,
    version: String,
    platform: String,
}

/// Split a package name into its three underscore-delimited fields. The
/// platform field may itself contain underscores.
pub fn split_name(name: &str) -> Result<(&str, &str, &str)> {
    let mut fields = name.splitn(3, '_');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(short_name), Some(version), Some(platform)) if !short_name.is_empty() => {
            Ok((short_name, version, platform))
        }
        _ => bail!("bad package name ({name})"),
    }
}

impl<'a> Package<'a> {
    /// Construct a package handle; the package need not exist, the domain
    /// must. Malformed names are a hard error.
    pub fn new(domain: &'a Domain, name: &str) -> Result<Self> {
        let (short_name, version, platform) = split_name(name)?;
        Ok(Self {
            domain,
            name: name.to_string(),
            path: domain.path().join(name),
            short_name: short_name.to_string(),
            version: version.to_string(),
            platform: platform.to_string(),
        })
    }

    pub fn domain(&self) -> &Domain {
        self.domain
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Directory presence is the authoritative installed truth; the domain's
    /// installed set is a secondary index.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Control map from `<package>/.ssm.d/control`, if the package exists.
    pub fn get_control(&self) -> Option<BTreeMap<String, String>> {
        if !self.exists() {
            return None;
        }
        let text = fsops::read_string_or(&self.path.join(".ssm.d/control"), "");
        Some(parse_control(&text))
    }

    /// True iff `package_name` has the same short name and platform as this
    /// package; such packages compete for one published slot.
    pub fn is_similar(&self, package_name: &str) -> Result<bool> {
        let (short_name, _, platform) = split_name(package_name)?;
        Ok(short_name == self.short_name && platform == self.platform)
    }

    /// Install this package from an archive.
    ///
    /// Not atomic: a failure mid-extraction leaves already-extracted members
    /// in place and surfaces a generic install failure.
    #[tracing::instrument(skip(self, config, archive, owner), fields(package = %self.name))]
    pub fn install(
        &self,
        config: &Config,
        archive: &mut PackageArchive,
        owner: Option<&Owner>,
        clobber: bool,
        force: bool,
    ) -> Result<()> {
        self.domain.ensure_unfrozen()?;

        let force = force || config.force;
        if self.exists() && !(force || clobber) {
            bail!("package already installed");
        }

        let result: Result<()> = (|| {
            archive::extract_package(
                config,
                archive,
                self.domain.path(),
                &self.name,
                owner,
                clobber,
            )?;
            self.execute_script(config, "post-install", None)?;
            self.domain.add_installed(&self.path)?;
            self.domain.remove_broken(&self.path)?;
            Ok(())
        })();
        result.map_err(|err| {
            debug!("install of {} failed: {err:#}", self.name);
            err.context("could not install")
        })
    }

    /// Uninstall/remove this package. A failure re-marks the package as
    /// broken before surfacing.
    #[tracing::instrument(skip(self, config), fields(package = %self.name))]
    pub fn uninstall(&self, config: &Config) -> Result<()> {
        self.domain.ensure_unfrozen()?;

        let result: Result<()> = (|| {
            if let Err(err) = self.execute_script(config, "pre-uninstall", None) {
                if !config.force {
                    return Err(err);
                }
                config.print_verbose("pre-uninstall failed; continuing because of --force");
            }
            fsops::rmtree(config, &self.path)?;
            self.domain.remove_installed(&self.path)?;
            self.domain.remove_broken(&self.path)?;
            Ok(())
        })();
        result.map_err(|err| {
            debug!("uninstall of {} failed: {err:#}", self.name);
            if let Err(mark_err) = self.domain.add_broken(&self.path) {
                debug!("could not mark {} broken: {mark_err:#}", self.name);
            }
            err.context("could not uninstall")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_REPO_SOURCE;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::tempdir;

    fn make_domain(root: &Path) -> Domain {
        let domain = Domain::new(root);
        domain.create("test", DEFAULT_REPO_SOURCE).unwrap();
        domain
    }

    fn write_archive(path: &Path, members: &[(&str, &str)]) {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in members {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, content.as_bytes()).unwrap();
        }
        let tar = builder.into_inner().unwrap();
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&tar).unwrap();
        std::fs::write(path, enc.finish().unwrap()).unwrap();
    }

    #[test]
    fn test_split_name() {
        let (short, version, platform) = split_name("gcc_4.1_linux26-i686").unwrap();
        assert_eq!((short, version, platform), ("gcc", "4.1", "linux26-i686"));

        // The platform keeps any further underscores.
        let (_, _, platform) = split_name("a_1_plat_form").unwrap();
        assert_eq!(platform, "plat_form");

        assert!(split_name("noversion").is_err());
        assert!(split_name("a_1").is_err());
    }

    #[test]
    fn test_is_similar() {
        let root = tempdir().unwrap();
        let domain = make_domain(root.path());
        let package = Package::new(&domain, "foo_1.0_linux").unwrap();
        assert!(package.is_similar("foo_2.0_linux").unwrap());
        assert!(!package.is_similar("foo_1.0_aix").unwrap());
        assert!(!package.is_similar("bar_1.0_linux").unwrap());
        assert!(package.is_similar("malformed").is_err());
    }

    #[test]
    fn test_get_control() {
        let root = tempdir().unwrap();
        let domain = make_domain(root.path());
        let package = Package::new(&domain, "pkg_1.0_all").unwrap();
        assert!(package.get_control().is_none());

        fsops::mkdirs(&package.path().join(".ssm.d")).unwrap();
        std::fs::write(
            package.path().join(".ssm.d/control"),
            "description: a tool\nmaintainer: alice",
        )
        .unwrap();
        let control = package.get_control().unwrap();
        assert_eq!(control["title"], "a tool");
        assert_eq!(control["maintainer"], "alice");
    }

    #[test]
    fn test_install_and_uninstall_roundtrip() {
        let root = tempdir().unwrap();
        let domain = make_domain(root.path());
        let archive_path = root.path().join("pkg_1.0_all.ssm");
        write_archive(&archive_path, &[("pkg_1.0_all/bin/tool", "binary")]);

        let config = Config::default();
        let package = Package::new(&domain, "pkg_1.0_all").unwrap();
        let mut archive = PackageArchive::open_path(&archive_path).unwrap();
        package
            .install(&config, &mut archive, None, false, false)
            .unwrap();

        assert!(package.exists());
        assert!(domain.is_installed("pkg_1.0_all"));

        package.uninstall(&config).unwrap();
        assert!(!package.exists());
        assert!(!domain.is_installed("pkg_1.0_all"));
    }

    #[test]
    fn test_install_refuses_when_already_installed() {
        let root = tempdir().unwrap();
        let domain = make_domain(root.path());
        let archive_path = root.path().join("pkg_1.0_all.ssm");
        write_archive(&archive_path, &[("pkg_1.0_all/file", "x")]);

        let config = Config::default();
        let package = Package::new(&domain, "pkg_1.0_all").unwrap();
        let mut archive = PackageArchive::open_path(&archive_path).unwrap();
        package
            .install(&config, &mut archive, None, false, false)
            .unwrap();

        let mut archive = PackageArchive::open_path(&archive_path).unwrap();
        let err = package
            .install(&config, &mut archive, None, false, false)
            .unwrap_err();
        assert!(err.to_string().contains("already installed"));
    }

    #[test]
    fn test_install_refused_on_frozen_domain() {
        let root = tempdir().unwrap();
        let domain = make_domain(root.path());
        let archive_path = root.path().join("pkg_1.0_all.ssm");
        write_archive(&archive_path, &[("pkg_1.0_all/file", "x")]);
        domain.freeze().unwrap();

        let config = Config::default();
        let package = Package::new(&domain, "pkg_1.0_all").unwrap();
        let mut archive = PackageArchive::open_path(&archive_path).unwrap();
        let err = package
            .install(&config, &mut archive, None, false, false)
            .unwrap_err();
        assert!(err.to_string().contains("frozen"));
        assert!(!package.exists());
    }

    #[test]
    fn test_failed_uninstall_marks_broken() {
        let root = tempdir().unwrap();
        let domain = make_domain(root.path());
        let archive_path = root.path().join("pkg_1.0_all.ssm");
        write_archive(&archive_path, &[("pkg_1.0_all/file", "x")]);

        let config = Config::default();
        let package = Package::new(&domain, "pkg_1.0_all").unwrap();
        let mut archive = PackageArchive::open_path(&archive_path).unwrap();
        package
            .install(&config, &mut archive, None, false, false)
            .unwrap();

        // A failing pre-uninstall hook aborts the uninstall without force.
        let meta_dir = package.path().join(".ssm.d");
        fsops::mkdirs(&meta_dir).unwrap();
        std::fs::write(meta_dir.join("pre-uninstall"), "#!/bin/sh\nexit 1\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(
            meta_dir.join("pre-uninstall"),
            std::fs::Permissions::from_mode(0o755),
        )
        .unwrap();

        let err = package.uninstall(&config).unwrap_err();
        assert!(err.to_string().contains("could not uninstall"));
        assert!(package.exists());
        assert!(domain.is_broken("pkg_1.0_all"));

        // A later forced uninstall clears the broken mark.
        let config = Config::new(false, false, true, false);
        package.uninstall(&config).unwrap();
        assert!(!package.exists());
        assert!(!domain.is_broken("pkg_1.0_all"));
    }
}
