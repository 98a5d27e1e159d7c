//! Package archive handling: opening (plain or gzipped tar) and safe
//! extraction of one package's members into a domain.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::debug;
use tar::{Archive, Entry};

use crate::config::Config;
use crate::fsops;
use crate::users::Owner;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// An opened package archive. The backing file may already be unlinked (for
/// downloaded archives); the handle keeps the data alive.
pub struct PackageArchive {
    archive: Archive<Box<dyn Read>>,
}

impl PackageArchive {
    /// Open a tar archive, transparently decompressing gzip.
    pub fn open(mut file: File) -> Result<Self> {
        let mut magic = [0u8; 2];
        let gzipped = match file.read_exact(&mut magic) {
            Ok(()) => magic == GZIP_MAGIC,
            Err(_) => false,
        };
        file.seek(SeekFrom::Start(0))
            .context("failed to rewind archive")?;
        let reader: Box<dyn Read> = if gzipped {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Self {
            archive: Archive::new(reader),
        })
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open archive {}", path.display()))?;
        Self::open(file)
    }
}

/// Extract the members of `package_name` from `archive` into `domain_path`.
///
/// Members whose normalized path is not rooted at the package's own name are
/// skipped with a warning (path-traversal guard). Existing destinations
/// follow the clobber rules: nothing is replaced unless `clobber` is set,
/// directories are never replaced, files are removed first. Per-member
/// failures are reported and do not abort the extraction; there is no
/// rollback of already-extracted members.
#[tracing::instrument(skip(config, archive, owner))]
pub fn extract_package(
    config: &Config,
    archive: &mut PackageArchive,
    domain_path: &Path,
    package_name: &str,
    owner: Option<&Owner>,
    clobber: bool,
) -> Result<()> {
    for entry in archive
        .archive
        .entries()
        .context("failed to read archive")?
    {
        let mut entry = entry.context("failed to read archive member")?;
        let raw = entry
            .path()
            .context("bad archive member path")?
            .into_owned();
        let Some(member) = normalize_member(&raw) else {
            continue;
        };
        if !is_member_of(&member, package_name) {
            config.print_warning(&format!(
                "rejecting member not part of package ({})",
                member.display()
            ));
            continue;
        }
        if let Err(err) = extract_member(config, &mut entry, domain_path, &member, owner, clobber) {
            debug!("member extraction failed: {err:#}");
            config.print_error(&format!("could not extract file ({})", member.display()));
        }
    }
    Ok(())
}

/// Lexically normalize a member path: drop `.` components, fold `..` into
/// the preceding component. Returns `None` for the bare `.` member.
fn normalize_member(raw: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// A member belongs to the package iff its first path component is exactly
/// the package name.
fn is_member_of(member: &Path, package_name: &str) -> bool {
    matches!(member.components().next(),
        Some(Component::Normal(first)) if first == std::ffi::OsStr::new(package_name))
}

fn extract_member<R: Read>(
    config: &Config,
    entry: &mut Entry<'_, R>,
    domain_path: &Path,
    member: &Path,
    owner: Option<&Owner>,
    clobber: bool,
) -> Result<()> {
    let dest = domain_path.join(member);
    if dest.symlink_metadata().is_ok() {
        if !clobber {
            config.print_warning(&format!("clobbering not enabled ({})", member.display()));
            return Ok(());
        }
        if dest.is_dir() {
            config.print_warning(&format!("cannot clobber directory ({})", member.display()));
            return Ok(());
        }
        config.print_warning(&format!("clobbering file ({})", member.display()));
        fsops::remove(&dest)?;
    }
    if let Some(parent) = dest.parent() {
        fsops::mkdirs(parent)?;
    }
    config.print_verbose(&format!("extracting member ({})", member.display()));
    entry
        .unpack(&dest)
        .with_context(|| format!("failed to unpack {}", member.display()))?;
    if let Some(owner) = owner {
        owner.apply(&dest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::tempdir;

    fn build_tar(members: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in members {
            let mut header = tar::Header::new_gnu();
            // Some members are intentionally malicious (e.g. "../evil") to exercise
            // rejection; the safe set_path API refuses `..`, so write such names into
            // the GNU header name field directly to still produce the entry.
            if header.set_path(name).is_err() {
                let gnu = header.as_gnu_mut().unwrap();
                let bytes = name.as_bytes();
                gnu.name[..bytes.len()].copy_from_slice(bytes);
            }
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn write_archive(path: &Path, members: &[(&str, &str)], gzip: bool) {
        let tar = build_tar(members);
        let bytes = if gzip {
            let mut enc = GzEncoder::new(Vec::new(), Compression::default());
            enc.write_all(&tar).unwrap();
            enc.finish().unwrap()
        } else {
            tar
        };
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_open_sniffs_gzip() {
        let dir = tempdir().unwrap();
        for gzip in [false, true] {
            let path = dir.path().join(if gzip { "a.ssm" } else { "b.ssm" });
            write_archive(&path, &[("pkg_1.0_all/bin/x", "data")], gzip);
            let mut archive = PackageArchive::open_path(&path).unwrap();
            let config = Config::default();
            extract_package(&config, &mut archive, dir.path(), "pkg_1.0_all", None, false)
                .unwrap();
            assert_eq!(
                std::fs::read_to_string(dir.path().join("pkg_1.0_all/bin/x")).unwrap(),
                "data"
            );
            std::fs::remove_dir_all(dir.path().join("pkg_1.0_all")).unwrap();
        }
    }

    #[test]
    fn test_foreign_members_are_rejected_and_rest_extracts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.ssm");
        write_archive(
            &path,
            &[
                ("../evil", "bad"),
                ("other_2.0_all/file", "bad"),
                ("pkg_1.0_all/ok", "good"),
            ],
            true,
        );
        let mut archive = PackageArchive::open_path(&path).unwrap();
        let config = Config::default();
        extract_package(&config, &mut archive, dir.path(), "pkg_1.0_all", None, false).unwrap();

        assert_eq!(config.warning_count(), 2);
        assert!(dir.path().join("pkg_1.0_all/ok").is_file());
        assert!(!dir.path().join("other_2.0_all").exists());
        assert!(!dir.path().parent().unwrap().join("evil").exists());
    }

    #[test]
    fn test_clobber_semantics() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.ssm");
        write_archive(&path, &[("pkg_1.0_all/file", "new")], true);

        std::fs::create_dir_all(dir.path().join("pkg_1.0_all")).unwrap();
        std::fs::write(dir.path().join("pkg_1.0_all/file"), "old").unwrap();

        // Without clobber the existing file is left untouched and warned about.
        let mut archive = PackageArchive::open_path(&path).unwrap();
        let config = Config::default();
        extract_package(&config, &mut archive, dir.path(), "pkg_1.0_all", None, false).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("pkg_1.0_all/file")).unwrap(),
            "old"
        );
        assert_eq!(config.warning_count(), 1);

        // With clobber the file is replaced.
        let mut archive = PackageArchive::open_path(&path).unwrap();
        let config = Config::default();
        extract_package(&config, &mut archive, dir.path(), "pkg_1.0_all", None, true).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("pkg_1.0_all/file")).unwrap(),
            "new"
        );
    }

    #[test]
    fn test_clobber_never_replaces_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.ssm");
        write_archive(&path, &[("pkg_1.0_all/thing", "file now")], true);

        std::fs::create_dir_all(dir.path().join("pkg_1.0_all/thing")).unwrap();

        let mut archive = PackageArchive::open_path(&path).unwrap();
        let config = Config::default();
        extract_package(&config, &mut archive, dir.path(), "pkg_1.0_all", None, true).unwrap();
        assert!(dir.path().join("pkg_1.0_all/thing").is_dir());
        assert_eq!(config.warning_count(), 1);
    }

    #[test]
    fn test_normalize_member() {
        assert_eq!(normalize_member(Path::new(".")), None);
        assert_eq!(
            normalize_member(Path::new("./pkg/./file")),
            Some(PathBuf::from("pkg/file"))
        );
        assert_eq!(
            normalize_member(Path::new("pkg/../evil")),
            Some(PathBuf::from("evil"))
        );
        assert_eq!(
            normalize_member(Path::new("../evil")),
            Some(PathBuf::from("../evil"))
        );
    }

    #[test]
    fn test_is_member_of_requires_exact_component() {
        assert!(is_member_of(Path::new("pkg_1.0_all/bin"), "pkg_1.0_all"));
        // A mere string prefix is not enough.
        assert!(!is_member_of(Path::new("pkg_1.0_all2/bin"), "pkg_1.0_all"));
        assert!(!is_member_of(Path::new("../evil"), "pkg_1.0_all"));
        assert!(!is_member_of(Path::new("/abs/path"), "pkg_1.0_all"));
    }
}
