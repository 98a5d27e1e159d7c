use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::PACKAGE_EXT;
use crate::config::Config;
use crate::domain::Domain;
use crate::http::HttpClient;
use crate::package::split_name;
use crate::repository::Repository;

use super::source_lines;

#[derive(clap::Args, Debug)]
pub struct ListrArgs {
    /// Domain from which to take repository sources
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH",
        conflicts_with = "repository_url"
    )]
    pub domain_home: Option<PathBuf>,

    /// Repository URL to search instead of the domain sources
    #[arg(short = 'u', long = "repository-url", value_name = "URL")]
    pub repository_url: Option<String>,

    /// Package name pattern to match (wildcards * and ? supported)
    #[arg(short = 'p', long = "package-name", value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Platform pattern to match (wildcards * and ? supported)
    #[arg(long, value_name = "PATTERN")]
    pub platforms: Option<String>,
}

/// List/find packages in a repository.
#[tracing::instrument(skip(config, args))]
pub fn listr(config: &Config, args: &ListrArgs) -> Result<()> {
    let sources = match &args.repository_url {
        Some(url) => vec![url.clone()],
        None => {
            let domain_home = args
                .domain_home
                .as_ref()
                .context("missing domain home or repository url")?;
            source_lines(&Domain::new(domain_home).get_sources())
        }
    };

    let name_pattern = args
        .pattern
        .as_deref()
        .map(glob::Pattern::new)
        .transpose()
        .context("bad package name pattern")?;
    let platform_pattern = args
        .platforms
        .as_deref()
        .map(glob::Pattern::new)
        .transpose()
        .context("bad platforms pattern")?;

    let suffix = format!(".{PACKAGE_EXT}");
    let http = HttpClient::new()?;
    let mut package_map = BTreeMap::new();
    for source in &sources {
        let repo = Repository::new(config, &http, source);
        for url in repo.list() {
            let filename = url.rsplit('/').next().unwrap_or(url);
            let Some(package_name) = filename.strip_suffix(&suffix) else {
                continue;
            };
            if name_pattern
                .as_ref()
                .is_some_and(|p| !p.matches(package_name))
            {
                continue;
            }
            if let Some(platform_pattern) = &platform_pattern {
                match split_name(package_name) {
                    Ok((_, _, platform)) if platform_pattern.matches(platform) => {}
                    _ => continue,
                }
            }
            package_map.insert(package_name.to_string(), url.clone());
        }
    }

    println!("{:<40} {}", "Package Name", "Url");
    println!("{:<40} {}", "------------", "---");
    for (package_name, url) in &package_map {
        println!("{package_name:<40} {url}");
    }
    Ok(())
}
