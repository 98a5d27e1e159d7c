use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::config::Config;
use crate::domain::Domain;

use super::check_compatible;

#[derive(clap::Args, Debug)]
pub struct FreezedArgs {
    /// Domain to freeze
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,
}

/// Freeze a domain so that all mutating operations are refused.
#[tracing::instrument(skip(_config, args))]
pub fn freezed(_config: &Config, args: &FreezedArgs) -> Result<()> {
    let domain = Domain::new(&args.domain_home);
    check_compatible(&domain)?;
    if domain.is_frozen() {
        bail!("domain already frozen");
    }
    domain.freeze()
}
