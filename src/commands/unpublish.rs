use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::config::Config;
use crate::domain::Domain;
use crate::package::Package;

use super::check_compatible;

#[derive(clap::Args, Debug)]
pub struct UnpublishArgs {
    /// Domain holding the published package
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,

    /// Name of the package to unpublish
    #[arg(short = 'p', long = "package-name", value_name = "NAME")]
    pub package_name: String,

    /// Platform to unpublish from (default: the package's own platform)
    #[arg(long = "pp", value_name = "PLATFORM")]
    pub publish_platform: Option<String>,
}

/// Remove a package from a platform's published tree.
#[tracing::instrument(skip(config, args))]
pub fn unpublish(config: &Config, args: &UnpublishArgs) -> Result<()> {
    let domain = Domain::new(&args.domain_home);
    check_compatible(&domain)?;

    let package = Package::new(&domain, &args.package_name)?;
    let platform = args
        .publish_platform
        .clone()
        .unwrap_or_else(|| package.platform().to_string());

    if !domain.is_published(&args.package_name, Some(&platform))? && !config.force {
        bail!("package not published");
    }
    domain.unpublish_package(config, &package, &platform)
}
