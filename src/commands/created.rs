use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;
use crate::domain::Domain;
use crate::{DEFAULT_DOMAIN_LABEL, DEFAULT_REPO_SOURCE};

#[derive(clap::Args, Debug)]
pub struct CreatedArgs {
    /// Path of the new domain
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,

    /// Descriptive text for the domain
    #[arg(short = 'L', long, value_name = "STRING", default_value = DEFAULT_DOMAIN_LABEL)]
    pub label: String,

    /// Repository sources setting
    #[arg(long, value_name = "STRING", default_value = DEFAULT_REPO_SOURCE)]
    pub sources: String,
}

/// Create a new domain, optionally with domain-specific settings.
#[tracing::instrument(skip(config, args))]
pub fn created(config: &Config, args: &CreatedArgs) -> Result<()> {
    let domain = Domain::new(&args.domain_home);
    domain.create(&args.label, &args.sources)?;
    config.print_verbose(&format!("created domain ({})", domain.path().display()));
    Ok(())
}
