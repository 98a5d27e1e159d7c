use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::Config;
use crate::domain::Domain;

use super::check_is_domain;

#[derive(clap::Args, Debug)]
pub struct ListdhArgs {
    /// Root domain of the hierarchy
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,
}

/// List a domain/subdomain hierarchy, one indented line per domain.
#[tracing::instrument(skip(_config, args))]
pub fn listdh(_config: &Config, args: &ListdhArgs) -> Result<()> {
    let domain = Domain::new(&args.domain_home);
    check_is_domain(&domain)?;

    let mut seen = HashSet::new();
    for (path, level) in collect_hierarchy(domain.path(), 0, &mut seen) {
        println!("{}{}", "  ".repeat(level), path.display());
    }
    Ok(())
}

/// Depth-first walk of the subdomain chain; a cycle is cut at the repeated
/// domain.
fn collect_hierarchy(
    path: &Path,
    level: usize,
    seen: &mut HashSet<PathBuf>,
) -> Vec<(PathBuf, usize)> {
    let mut out = vec![(path.to_path_buf(), level)];
    if !seen.insert(path.to_path_buf()) {
        return out;
    }
    for subdomain in Domain::new(path).get_subdomains() {
        out.extend(collect_hierarchy(&subdomain, level + 1, seen));
    }
    out
}
