use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::config::Config;
use crate::domain::Domain;
use crate::package::Package;

use super::{check_compatible, check_is_domain};

#[derive(clap::Args, Debug)]
pub struct PublishArgs {
    /// Domain of the installed package; also the default publish domain
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,

    /// Name of the package to publish
    #[arg(short = 'p', long = "package-name", value_name = "NAME")]
    pub package_name: String,

    /// Platform to publish to (default: the package's own platform)
    #[arg(long = "pp", value_name = "PLATFORM")]
    pub publish_platform: Option<String>,

    /// Alternate domain in which to publish the package
    #[arg(short = 'P', long = "publish-home", value_name = "PATH")]
    pub publish_home: Option<PathBuf>,

    /// Do nothing if the package is already published
    #[arg(long = "skip-on-published")]
    pub skip_on_published: bool,
}

/// Publish an installed package under a platform tree, evicting any
/// previously published similar package (one slot per short name and
/// platform).
#[tracing::instrument(skip(config, args))]
pub fn publish(config: &Config, args: &PublishArgs) -> Result<()> {
    let domain = Domain::new(&args.domain_home);
    check_is_domain(&domain)?;
    check_compatible(&domain)?;

    let publish_home = args
        .publish_home
        .clone()
        .unwrap_or_else(|| args.domain_home.clone());
    let publish_domain = Domain::new(&publish_home);
    check_is_domain(&publish_domain)?;

    let package = Package::new(&domain, &args.package_name)?;
    let platform = args
        .publish_platform
        .clone()
        .unwrap_or_else(|| package.platform().to_string());

    if !domain.is_installed(&args.package_name) {
        bail!("cannot find package ({})", args.package_name);
    }

    // Unpublish the same-named package first if necessary.
    if publish_domain.is_published(&args.package_name, Some(&platform))? {
        if args.skip_on_published {
            println!("skipping published package");
            return Ok(());
        }
        if !config.confirm("unpublish current package (y/n)?")? {
            bail!("operation aborted");
        }
        publish_domain.unpublish_package(config, &package, &platform)?;
    }

    // Evict any published "similar" package: one published slot per
    // short_name and platform.
    for published_path in publish_domain.get_published(&platform)? {
        let Some(published_name) = published_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if package.is_similar(published_name)? {
            let evicted = Package::new(&domain, published_name)?;
            publish_domain.unpublish_package(config, &evicted, &platform)?;
        }
    }

    publish_domain.publish_package(config, &package, &platform)
}
