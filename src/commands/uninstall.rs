use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::config::Config;
use crate::domain::Domain;
use crate::package::Package;

use super::check_compatible;

#[derive(clap::Args, Debug)]
pub struct UninstallArgs {
    /// Domain holding the package
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,

    /// Name of the package to uninstall
    #[arg(short = 'p', long = "package-name", value_name = "NAME")]
    pub package_name: String,
}

/// Uninstall a package from a domain. Published packages are refused unless
/// forced.
#[tracing::instrument(skip(config, args))]
pub fn uninstall(config: &Config, args: &UninstallArgs) -> Result<()> {
    let domain = Domain::new(&args.domain_home);
    check_compatible(&domain)?;

    let package = Package::new(&domain, &args.package_name)?;
    if domain.is_published(&args.package_name, None)? && !config.force {
        bail!("package is published");
    }
    if !package.exists() && !domain.is_installed(&args.package_name) {
        bail!("package is not installed");
    }
    package.uninstall(config)
}
