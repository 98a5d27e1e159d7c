use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::domain::Domain;

use super::check_compatible;

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = true)]
pub struct UpdatedSettings {
    /// Set the descriptive text for the domain
    #[arg(short = 'L', long, value_name = "STRING")]
    pub label: Option<String>,

    /// Set the repository sources setting
    #[arg(long, value_name = "STRING")]
    pub sources: Option<String>,

    /// Set the ordered subdomain list from a file (one path per line)
    #[arg(long, value_name = "FILENAME")]
    pub subdomains: Option<PathBuf>,

    /// Update the support files to the version of the running tool
    #[arg(long)]
    pub support: bool,
}

#[derive(clap::Args, Debug)]
pub struct UpdatedArgs {
    /// Domain to update
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,

    #[command(flatten)]
    pub settings: UpdatedSettings,
}

/// Update domain-specific settings and/or support files.
#[tracing::instrument(skip(config, args))]
pub fn updated(config: &Config, args: &UpdatedArgs) -> Result<()> {
    let domain = Domain::new(&args.domain_home);
    check_compatible(&domain)?;

    if let Some(label) = &args.settings.label {
        domain.set_label(label)?;
    }
    if let Some(sources) = &args.settings.sources {
        domain.set_sources(sources)?;
    }
    if let Some(filename) = &args.settings.subdomains {
        let text = std::fs::read_to_string(filename)
            .with_context(|| format!("cannot read subdomains file ({})", filename.display()))?;
        let subdomains: Vec<PathBuf> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();
        domain.set_subdomains(&subdomains)?;
    }
    if args.settings.support {
        domain.update_support()?;
        config.print_verbose("updated support files");
    }
    Ok(())
}
