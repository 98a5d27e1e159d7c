use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use walkdir::WalkDir;

use crate::config::Config;
use crate::display;
use crate::domain::Domain;

use super::listd::state_lines;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum FindType {
    /// Match package names (default)
    Package,
    /// Match domain names
    Domain,
    /// Match file/directory names anywhere in a domain
    Name,
    /// Match files under package bin/ directories
    Bin,
    /// Match files under package lib/ directories
    Lib,
}

#[derive(clap::Args, Debug)]
pub struct FindArgs {
    /// Term to find; wildcards (* and ?) are supported
    #[arg(value_name = "TERM")]
    pub term: String,

    /// Path(s) under which to search; may be domain paths
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Maximum depth below each path to search for domains
    #[arg(long, default_value_t = 4)]
    pub depth: usize,

    /// Print one full path per line instead of the state summary
    #[arg(short = 'l', long)]
    pub long: bool,

    /// Criteria for matching the term
    #[arg(long = "type", value_enum, default_value_t = FindType::Package)]
    pub find_type: FindType,
}

/// Search for a term within domains found at or below the given paths.
#[tracing::instrument(skip(_config, args))]
pub fn find(_config: &Config, args: &FindArgs) -> Result<()> {
    let base_paths = if args.paths.is_empty() {
        default_base_paths()
    } else {
        args.paths.clone()
    };
    if base_paths.is_empty() {
        bail!("no place to search");
    }

    // A bare package term without wildcards or underscores matches every
    // version and platform of that short name.
    let mut term = args.term.clone();
    if args.find_type == FindType::Package
        && !term.contains(['*', '?', '_'])
    {
        term.push_str("_*");
    }
    let pattern = glob::Pattern::new(&term).context("bad term pattern")?;

    let width = display::terminal_width();
    for base_path in &base_paths {
        let domain_homes = find_domains(base_path, args.depth, false);

        if args.find_type == FindType::Domain {
            let matches: Vec<String> = domain_homes
                .iter()
                .filter(|home| {
                    home.file_name()
                        .map(|n| pattern.matches(&n.to_string_lossy()))
                        .unwrap_or(false)
                })
                .map(|home| home.display().to_string())
                .collect();
            display::print_columns(&matches, width);
            if !matches.is_empty() {
                println!();
            }
            continue;
        }

        for domain_home in &domain_homes {
            let domain = Domain::new(domain_home);
            let (package_names, paths) = match args.find_type {
                FindType::Package => {
                    let names = domain.get_package_names(Some(&term))?;
                    (names, Vec::new())
                }
                FindType::Name => (
                    Vec::new(),
                    find_in_path(domain_home, &pattern, args.depth),
                ),
                FindType::Bin => (Vec::new(), find_in_component(&domain, "bin", &pattern)?),
                FindType::Lib => (Vec::new(), find_in_component(&domain, "lib", &pattern)?),
                FindType::Domain => unreachable!("handled above"),
            };

            if package_names.is_empty() && paths.is_empty() {
                continue;
            }
            println!(
                "==========  {} ({})  ==========",
                domain_home.display(),
                domain.get_label()
            );

            if args.find_type != FindType::Package {
                for path in &paths {
                    println!("{}", path.display());
                }
            } else if args.long {
                for name in &package_names {
                    println!("{}", domain.path().join(name).display());
                }
            } else {
                let lines = state_lines(&domain, &package_names)?;
                display::print_columns(&lines, width);
            }
            println!();
        }
    }
    Ok(())
}

fn default_base_paths() -> Vec<PathBuf> {
    let bases = std::env::var("SSM_DOMAIN_BASE")
        .or_else(|_| std::env::var("SSM_DOMAIN_HOME"))
        .unwrap_or_default();
    bases
        .split(':')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Domain homes at or below `base`, to a bounded depth. Hidden directories
/// are skipped unless requested; the walk does not descend into a found
/// domain.
fn find_domains(base: &Path, max_depth: usize, hidden: bool) -> Vec<PathBuf> {
    if Domain::new(base).is_domain() {
        return vec![base.to_path_buf()];
    }
    let mut homes = Vec::new();
    let mut walker = WalkDir::new(base)
        .follow_links(true)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter();
    loop {
        let entry = match walker.next() {
            None => break,
            Some(Err(_)) => continue,
            Some(Ok(entry)) => entry,
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if !hidden && entry.file_name().to_string_lossy().starts_with('.') {
            walker.skip_current_dir();
            continue;
        }
        if Domain::new(entry.path()).is_domain() {
            homes.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }
    homes.sort();
    homes
}

/// Files and directories under `path` whose name matches the pattern;
/// directory names are matched with a trailing slash.
fn find_in_path(path: &Path, pattern: &glob::Pattern, max_depth: usize) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(path)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() {
                pattern.matches(&format!("{name}/"))
            } else {
                pattern.matches(&name)
            }
        })
        .map(|entry| entry.into_path())
        .collect();
    found.sort();
    found
}

/// Matches under `<domain>/<package>/<component>` for every installed
/// package, e.g. the bin/ directories.
fn find_in_component(
    domain: &Domain,
    component: &str,
    pattern: &glob::Pattern,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for package_name in domain.get_package_names(None)? {
        let root = domain.path().join(&package_name).join(component);
        found.extend(find_in_path(&root, pattern, 10));
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_REPO_SOURCE;
    use tempfile::tempdir;

    #[test]
    fn test_find_domains_bounded_depth() {
        let root = tempdir().unwrap();
        let shallow = root.path().join("one/dom");
        let deep = root.path().join("a/b/c/d/e/dom");
        Domain::new(&shallow).create("x", DEFAULT_REPO_SOURCE).unwrap();
        Domain::new(&deep).create("x", DEFAULT_REPO_SOURCE).unwrap();

        let homes = find_domains(root.path(), 4, false);
        assert_eq!(homes.len(), 1);
        assert!(homes[0].ends_with("one/dom"));
    }

    #[test]
    fn test_find_domains_returns_base_when_domain() {
        let root = tempdir().unwrap();
        Domain::new(root.path())
            .create("x", DEFAULT_REPO_SOURCE)
            .unwrap();
        let homes = find_domains(root.path(), 4, false);
        assert_eq!(homes, vec![root.path().to_path_buf()]);
    }

    #[test]
    fn test_find_in_path_matches_dirs_with_slash() {
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("bin")).unwrap();
        std::fs::write(root.path().join("bin/tool"), "x").unwrap();

        let pattern = glob::Pattern::new("bin/").unwrap();
        let found = find_in_path(root.path(), &pattern, 10);
        assert_eq!(found, vec![root.path().join("bin")]);

        let pattern = glob::Pattern::new("tool").unwrap();
        let found = find_in_path(root.path(), &pattern, 10);
        assert_eq!(found, vec![root.path().join("bin/tool")]);
    }
}
