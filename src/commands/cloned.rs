use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::Config;
use crate::domain::{Domain, PackageState};
use crate::http::HttpClient;
use crate::package::Package;
use crate::repository::Repository;

use super::{check_compatible, source_lines};

#[derive(clap::Args, Debug)]
pub struct ClonedArgs {
    /// Source domain to clone
    #[arg(value_name = "SRC")]
    pub src_domain_home: PathBuf,

    /// Destination domain to create
    #[arg(value_name = "DST")]
    pub dst_domain_home: PathBuf,

    /// Clone the domain settings
    #[arg(long)]
    pub domain: bool,

    /// Reinstall the source domain's installed packages
    #[arg(long)]
    pub installed: bool,

    /// Republish the source domain's published packages
    #[arg(long)]
    pub published: bool,

    /// Descriptive text for the new domain
    #[arg(short = 'L', long, value_name = "STRING")]
    pub label: Option<String>,

    /// Unpublish and republish packages already published in the destination
    #[arg(long)]
    pub republish: bool,

    /// Alternate source domain for published package paths
    #[arg(short = 's', value_name = "PATH")]
    pub alt_src_domain_home: Option<PathBuf>,

    /// Repository URL to install from instead of the source domain sources
    #[arg(short = 'u', long = "repository-url", value_name = "URL")]
    pub repository_url: Option<String>,
}

/// Clone a domain: its settings, its installed set (reinstalled from a
/// repository) and its published set. With no selection flags, everything is
/// cloned; a frozen source yields a frozen clone.
#[tracing::instrument(skip(config, args))]
pub fn cloned(config: &Config, args: &ClonedArgs) -> Result<()> {
    let (clone_domain, clone_installed, clone_published) =
        if !args.domain && !args.installed && !args.published {
            (true, true, true)
        } else {
            (args.domain, args.installed, args.published)
        };

    let src_domain = Domain::new(&args.src_domain_home);
    let dst_domain = Domain::new(&args.dst_domain_home);
    let alt_src_domain = args.alt_src_domain_home.as_deref().map(Domain::new);
    check_compatible(&src_domain)?;
    if let Some(alt) = &alt_src_domain {
        check_compatible(alt)?;
    }

    let sources = match &args.repository_url {
        Some(url) => url.clone(),
        None => alt_src_domain
            .as_ref()
            .unwrap_or(&src_domain)
            .get_sources(),
    };

    if clone_domain {
        config.print_verbose(&format!(
            "creating new domain ({})",
            dst_domain.path().display()
        ));
        let label = args.label.as_deref().unwrap_or(crate::DEFAULT_DOMAIN_LABEL);
        dst_domain.create(label, &sources)?;

        config.print_verbose("setting subdomains");
        dst_domain.set_subdomains(&src_domain.get_subdomains())?;
    }

    let http = HttpClient::new()?;
    if clone_installed {
        let repos: Vec<Repository<'_>> = source_lines(&sources)
            .iter()
            .map(|source| Repository::new(config, &http, source))
            .collect();
        let installed = src_domain.get_packages_with_state(PackageState::Installed, None)?;
        for name in installed.keys() {
            config.print_verbose(&format!("installing package ({name})"));
            let Some(mut archive) = repos.iter().find_map(|repo| repo.get(name)) else {
                config.print_warning(&format!("could not find package ({name})"));
                continue;
            };
            let dst_package = Package::new(&dst_domain, name)?;
            if let Err(err) = dst_package.install(config, &mut archive, None, false, false) {
                log::debug!("clone install of {name} failed: {err:#}");
                config.print_warning(&format!("could not install package ({name})"));
            }
        }
    }

    if clone_published {
        for platform in src_domain.get_published_platforms() {
            for target in src_domain.get_published(&platform)? {
                let Some(name) = target
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                else {
                    continue;
                };

                if let Some(alt) = &alt_src_domain {
                    config.print_verbose(&format!(
                        "publishing package ({name}) from alt src domain ({})",
                        alt.path().display()
                    ));
                    let package = Package::new(alt, &name)?;
                    if !package.exists() {
                        config.print_warning("cannot find package in alternate source domain");
                        continue;
                    }
                    publish_clone(config, &dst_domain, &package, &platform, args.republish)?;
                } else if target.parent() == Some(src_domain.path()) {
                    // Locally installed in the source: point the clone's
                    // publish at its own reinstalled copy.
                    config.print_verbose(&format!(
                        "publishing package ({name}) from src domain ({})",
                        src_domain.path().display()
                    ));
                    let package = Package::new(&dst_domain, &name)?;
                    publish_clone(config, &dst_domain, &package, &platform, args.republish)?;
                } else {
                    // Cross-domain publish in the source: keep pointing at
                    // the foreign package path.
                    let foreign = Domain::new(target.parent().unwrap_or(Path::new("/")));
                    config.print_verbose(&format!(
                        "publishing package ({name}) from alt src domain ({})",
                        foreign.path().display()
                    ));
                    let package = Package::new(&foreign, &name)?;
                    publish_clone(config, &dst_domain, &package, &platform, args.republish)?;
                }
            }
        }
    }

    if src_domain.is_frozen() {
        config.print_verbose(&format!(
            "freezing domain ({})",
            dst_domain.path().display()
        ));
        dst_domain.freeze()?;
    }
    Ok(())
}

fn publish_clone(
    config: &Config,
    dst_domain: &Domain,
    package: &Package<'_>,
    platform: &str,
    republish: bool,
) -> Result<()> {
    if dst_domain.is_published(package.name(), Some(platform))? {
        if republish {
            dst_domain.unpublish_package(config, package, platform)?;
        } else {
            config.print_warning(&format!(
                "skipping published package ({})",
                package.name()
            ));
            return Ok(());
        }
    }
    dst_domain.publish_package(config, package, platform)
}
