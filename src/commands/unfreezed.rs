use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::config::Config;
use crate::domain::Domain;

use super::check_compatible;

#[derive(clap::Args, Debug)]
pub struct UnfreezedArgs {
    /// Domain to unfreeze
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,
}

/// Unfreeze a domain, re-enabling mutating operations.
#[tracing::instrument(skip(_config, args))]
pub fn unfreezed(_config: &Config, args: &UnfreezedArgs) -> Result<()> {
    let domain = Domain::new(&args.domain_home);
    check_compatible(&domain)?;
    if !domain.is_frozen() {
        bail!("domain not frozen");
    }
    domain.unfreeze()
}
