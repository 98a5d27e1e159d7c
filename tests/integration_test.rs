use assert_cmd::Command;
use flate2::Compression;
use flate2::write::GzEncoder;
use predicates::prelude::*;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use tar::Builder;
use tempfile::tempdir;

fn create_tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut tar_builder = Builder::new(Vec::new());
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        // Some members are intentionally malicious (e.g. "../evil") to exercise
        // rejection; the safe set_path API refuses `..`, so write such names into
        // the GNU header name field directly to still produce the entry.
        if header.set_path(name).is_err() {
            let gnu = header.as_gnu_mut().unwrap();
            let bytes = name.as_bytes();
            gnu.name[..bytes.len()].copy_from_slice(bytes);
        }
        header.set_mode(0o644);
        header.set_cksum();
        tar_builder.append(&header, content.as_bytes()).unwrap();
    }
    let tar = tar_builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

fn write_package_archive(repo_dir: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let path = repo_dir.join(format!("{name}.ssm"));
    std::fs::write(&path, create_tar_gz(files)).unwrap();
    path
}

fn ssm() -> Command {
    let mut cmd = Command::cargo_bin("ssm").unwrap();
    cmd.env_remove("SSM_DOMAIN_HOME");
    cmd.env_remove("SSM_DOMAIN_BASE");
    cmd
}

fn create_domain(path: &Path, label: &str) {
    ssm()
        .args(["created", "-d"])
        .arg(path)
        .args(["-L", label])
        .assert()
        .success();
}

#[test]
fn test_created_and_showd() {
    let dir = tempdir().unwrap();
    let dom = dir.path().join("dom");
    create_domain(&dom, "Test domain");

    assert!(dom.join("etc/ssm.d/installed").is_dir());
    assert!(dom.join("etc/ssm.d/published").is_dir());
    assert!(dom.join("etc/ssm.d/broken").is_dir());
    assert!(dom.join("etc/ssm.d/version").is_file());

    ssm()
        .args(["showd", "-d"])
        .arg(&dom)
        .arg("--label")
        .assert()
        .success()
        .stdout(predicate::str::contains("Test domain"));

    // A second create over the same path is refused.
    ssm()
        .args(["created", "-d"])
        .arg(&dom)
        .assert()
        .failure()
        .stderr(predicate::str::contains("existing domain"));
}

#[test]
fn test_install_from_file_and_uninstall() {
    let dir = tempdir().unwrap();
    let dom = dir.path().join("dom");
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    create_domain(&dom, "d");
    let archive =
        write_package_archive(&repo, "hello_1.0_all", &[("hello_1.0_all/bin/hello", "hi\n")]);

    ssm()
        .args(["install", "-d"])
        .arg(&dom)
        .arg("-f")
        .arg(&archive)
        .assert()
        .success();

    assert!(dom.join("hello_1.0_all/bin/hello").is_file());
    assert!(
        dom.join("etc/ssm.d/installed/hello_1.0_all")
            .symlink_metadata()
            .is_ok()
    );

    // Already installed without force/clobber.
    ssm()
        .args(["install", "-d"])
        .arg(&dom)
        .arg("-f")
        .arg(&archive)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already installed"));

    ssm()
        .args(["uninstall", "-d"])
        .arg(&dom)
        .args(["-p", "hello_1.0_all"])
        .assert()
        .success();
    assert!(!dom.join("hello_1.0_all").exists());
    assert!(
        dom.join("etc/ssm.d/installed/hello_1.0_all")
            .symlink_metadata()
            .is_err()
    );

    // Uninstalling again is a plain error, not a crash.
    ssm()
        .args(["uninstall", "-d"])
        .arg(&dom)
        .args(["-p", "hello_1.0_all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn test_install_by_name_searches_repository_urls() {
    let dir = tempdir().unwrap();
    let dom = dir.path().join("dom");
    let empty_repo = dir.path().join("empty");
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(&empty_repo).unwrap();
    std::fs::create_dir_all(&repo).unwrap();
    create_domain(&dom, "d");
    write_package_archive(&repo, "tool_2.1_linux", &[("tool_2.1_linux/bin/tool", "x")]);

    // The first source has nothing; install falls through to the second.
    let urls = format!("{},{}", empty_repo.display(), repo.display());
    ssm()
        .args(["install", "-d"])
        .arg(&dom)
        .args(["-p", "tool_2.1_linux", "-u"])
        .arg(&urls)
        .assert()
        .success();
    assert!(dom.join("tool_2.1_linux/bin/tool").is_file());

    ssm()
        .args(["install", "-d"])
        .arg(&dom)
        .args(["-p", "missing_1.0_all", "-u"])
        .arg(&urls)
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find package"));
}

#[test]
fn test_install_rejects_traversal_members() {
    let dir = tempdir().unwrap();
    let dom = dir.path().join("dom");
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    create_domain(&dom, "d");
    let archive = write_package_archive(
        &repo,
        "pkg_1.0_all",
        &[("../evil", "bad"), ("pkg_1.0_all/ok", "good")],
    );

    ssm()
        .args(["install", "-d"])
        .arg(&dom)
        .arg("-f")
        .arg(&archive)
        .assert()
        .success()
        .stderr(predicate::str::contains("rejecting member"));

    assert!(dom.join("pkg_1.0_all/ok").is_file());
    assert!(!dir.path().join("evil").exists());
    assert!(!dom.join("evil").exists());
}

#[test]
fn test_clobber_semantics() {
    let dir = tempdir().unwrap();
    let dom = dir.path().join("dom");
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    create_domain(&dom, "d");
    let v1 = write_package_archive(&repo, "pkg_1.0_all", &[("pkg_1.0_all/data", "old")]);
    let repo2 = dir.path().join("repo2");
    std::fs::create_dir_all(&repo2).unwrap();
    let v2 = write_package_archive(&repo2, "pkg_1.0_all", &[("pkg_1.0_all/data", "new")]);

    ssm()
        .args(["install", "-d"])
        .arg(&dom)
        .arg("-f")
        .arg(&v1)
        .assert()
        .success();
    assert_eq!(
        std::fs::read_to_string(dom.join("pkg_1.0_all/data")).unwrap(),
        "old"
    );

    // Re-install with --force but without --clobber: the existing file stays.
    ssm()
        .args(["install", "--force", "-d"])
        .arg(&dom)
        .arg("-f")
        .arg(&v1)
        .assert()
        .success()
        .stderr(predicate::str::contains("clobbering not enabled"));
    assert_eq!(
        std::fs::read_to_string(dom.join("pkg_1.0_all/data")).unwrap(),
        "old"
    );

    // With --clobber the file is replaced (v2 ships pkg_1.0_all members).
    ssm()
        .args(["install", "--clobber", "-d"])
        .arg(&dom)
        .arg("-f")
        .arg(&v2)
        .assert()
        .success()
        .stderr(predicate::str::contains("clobbering file"));
    assert_eq!(
        std::fs::read_to_string(dom.join("pkg_1.0_all/data")).unwrap(),
        "new"
    );
}

#[test]
fn test_publish_unpublish_roundtrip_and_eviction() {
    let dir = tempdir().unwrap();
    let dom = dir.path().join("dom");
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    create_domain(&dom, "d");
    for (name, file) in [
        ("foo_1.0_linux", "foo_1.0_linux/bin/foo"),
        ("foo_2.0_linux", "foo_2.0_linux/bin/foo"),
    ] {
        let archive = write_package_archive(&repo, name, &[(file, "x")]);
        ssm()
            .args(["install", "-d"])
            .arg(&dom)
            .arg("-f")
            .arg(&archive)
            .assert()
            .success();
    }

    ssm()
        .args(["publish", "-d"])
        .arg(&dom)
        .args(["-p", "foo_1.0_linux"])
        .assert()
        .success();
    assert!(
        dom.join("etc/ssm.d/published/linux/foo_1.0_linux")
            .symlink_metadata()
            .is_ok()
    );

    // Publishing a similar package evicts the old one: exactly one published
    // entry for foo/linux afterwards.
    ssm()
        .args(["publish", "-y", "-d"])
        .arg(&dom)
        .args(["-p", "foo_2.0_linux"])
        .assert()
        .success();
    let published: Vec<_> = std::fs::read_dir(dom.join("etc/ssm.d/published/linux"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(published, vec!["foo_2.0_linux"]);

    // A published package refuses to uninstall.
    ssm()
        .args(["uninstall", "-d"])
        .arg(&dom)
        .args(["-p", "foo_2.0_linux"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("published"));

    ssm()
        .args(["unpublish", "-d"])
        .arg(&dom)
        .args(["-p", "foo_2.0_linux"])
        .assert()
        .success();
    assert!(
        dom.join("etc/ssm.d/published/linux/foo_2.0_linux")
            .symlink_metadata()
            .is_err()
    );
    // Installed state is unchanged by the publish cycle.
    assert!(dom.join("foo_2.0_linux").is_dir());
}

#[test]
fn test_frozen_domain_gates_mutations() {
    let dir = tempdir().unwrap();
    let dom = dir.path().join("dom");
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    create_domain(&dom, "d");
    let archive = write_package_archive(&repo, "pkg_1.0_all", &[("pkg_1.0_all/f", "x")]);

    ssm().args(["freezed", "-d"]).arg(&dom).assert().success();

    ssm()
        .args(["install", "-d"])
        .arg(&dom)
        .arg("-f")
        .arg(&archive)
        .assert()
        .failure()
        .stderr(predicate::str::contains("frozen"));
    assert!(!dom.join("pkg_1.0_all").exists());

    ssm()
        .args(["updated", "-d"])
        .arg(&dom)
        .args(["-L", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("frozen"));

    // Freezing twice is refused; unfreezing re-enables mutation.
    ssm()
        .args(["freezed", "-d"])
        .arg(&dom)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already frozen"));
    ssm().args(["unfreezed", "-d"]).arg(&dom).assert().success();
    ssm()
        .args(["install", "-d"])
        .arg(&dom)
        .arg("-f")
        .arg(&archive)
        .assert()
        .success();
}

#[test]
fn test_listd_shows_states() {
    let dir = tempdir().unwrap();
    let dom = dir.path().join("dom");
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    create_domain(&dom, "listing domain");
    let archive = write_package_archive(&repo, "pkg_1.0_linux", &[("pkg_1.0_linux/f", "x")]);
    ssm()
        .args(["install", "-d"])
        .arg(&dom)
        .arg("-f")
        .arg(&archive)
        .assert()
        .success();

    ssm()
        .args(["listd", "-d"])
        .arg(&dom)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("listing domain")
                .and(predicate::str::contains("I  pkg_1.0_linux")),
        );

    ssm()
        .args(["publish", "-d"])
        .arg(&dom)
        .args(["-p", "pkg_1.0_linux"])
        .assert()
        .success();
    ssm()
        .args(["listd", "-d"])
        .arg(&dom)
        .assert()
        .success()
        .stdout(predicate::str::contains("IP pkg_1.0_linux"));
}

#[test]
fn test_listr_tabulates_repository() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    write_package_archive(&repo, "a_1.0_linux", &[("a_1.0_linux/f", "x")]);
    write_package_archive(&repo, "b_2.0_aix", &[("b_2.0_aix/f", "x")]);

    ssm()
        .args(["listr", "-u"])
        .arg(&repo)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("a_1.0_linux").and(predicate::str::contains("b_2.0_aix")),
        );

    ssm()
        .args(["listr", "-u"])
        .arg(&repo)
        .args(["--platforms", "linux"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("a_1.0_linux")
                .and(predicate::str::contains("b_2.0_aix").not()),
        );
}

#[test]
fn test_find_packages_across_domains() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base");
    let dom = base.join("dom");
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    create_domain(&dom, "findable");
    let archive = write_package_archive(&repo, "tool_1.0_all", &[("tool_1.0_all/bin/t", "x")]);
    ssm()
        .args(["install", "-d"])
        .arg(&dom)
        .arg("-f")
        .arg(&archive)
        .assert()
        .success();

    // A bare short name matches every version/platform of the package.
    ssm()
        .args(["find", "tool"])
        .arg(&base)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("findable").and(predicate::str::contains("tool_1.0_all")),
        );
}

#[test]
fn test_version_subcommand() {
    ssm()
        .args(["version"])
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
