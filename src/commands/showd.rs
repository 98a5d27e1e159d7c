use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;
use crate::domain::Domain;

use super::{check_compatible, check_is_domain};

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = true)]
pub struct ShowdSelection {
    /// Show the paths of the installed packages
    #[arg(long)]
    pub installed: bool,

    /// Show the descriptive text of the domain
    #[arg(short = 'L', long)]
    pub label: bool,

    /// Show the paths of the published packages (all platforms)
    #[arg(long)]
    pub published: bool,

    /// Show the repository sources setting
    #[arg(long)]
    pub sources: bool,

    /// Show the ordered list of immediate subdomains
    #[arg(long)]
    pub subdomains: bool,

    /// Show the version of the domain support files
    #[arg(long)]
    pub version: bool,

    /// Show published entries whose target package no longer exists
    #[arg(long)]
    pub dangling: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowdArgs {
    /// Domain to show
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,

    #[command(flatten)]
    pub selection: ShowdSelection,
}

/// Show domain settings and state.
#[tracing::instrument(skip(_config, args))]
pub fn showd(_config: &Config, args: &ShowdArgs) -> Result<()> {
    let domain = Domain::new(&args.domain_home);
    check_is_domain(&domain)?;
    check_compatible(&domain)?;

    let selection = &args.selection;
    if selection.installed {
        for path in domain.get_installed()? {
            println!("{}", path.display());
        }
    }
    if selection.label {
        println!("{}", domain.get_label());
    }
    if selection.published {
        for platform in domain.get_published_platforms() {
            for path in domain.get_published(&platform)? {
                println!("{}", path.display());
            }
        }
    }
    if selection.sources {
        println!("{}", domain.get_sources().trim_end());
    }
    if selection.subdomains {
        for path in domain.get_subdomains() {
            println!("{}", path.display());
        }
    }
    if selection.version {
        println!("{}", domain.get_version()?.join("."));
    }
    if selection.dangling {
        for platform in domain.get_published_platforms() {
            for name in domain.get_dangling_published(&platform)? {
                println!("{platform}/{name}");
            }
        }
    }
    Ok(())
}
