use std::path::PathBuf;

use anyhow::{Result, bail};
use log::debug;
use nix::unistd::geteuid;

use crate::PACKAGE_EXT;
use crate::config::Config;
use crate::domain::Domain;
use crate::http::HttpClient;
use crate::package::Package;
use crate::repository::Repository;
use crate::users::{self, Owner};

use super::{check_compatible, source_lines};

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Domain in which to install the package
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,

    /// Package archive filename (ending with .ssm)
    #[arg(short = 'f', value_name = "FILENAME", conflicts_with = "package_name")]
    pub filename: Option<PathBuf>,

    /// Name of the package to install
    #[arg(short = 'p', long = "package-name", value_name = "NAME")]
    pub package_name: Option<String>,

    /// Repository URL(s) to search instead of the domain's sources
    #[arg(
        short = 'u',
        long = "repository-url",
        value_name = "URL[,...]",
        value_delimiter = ','
    )]
    pub repository_urls: Option<Vec<String>>,

    /// Permit existing files to be overwritten
    #[arg(long)]
    pub clobber: bool,

    /// Do nothing if the package is already installed
    #[arg(long = "skip-on-installed")]
    pub skip_on_installed: bool,

    /// Owner username for extracted files
    #[arg(short = 'U', long = "user-name", value_name = "NAME")]
    pub username: Option<String>,

    /// Owner group for extracted files
    #[arg(short = 'G', long = "group-name", value_name = "NAME")]
    pub groupname: Option<String>,
}

/// Install a package to a domain, searching each configured source in order.
#[tracing::instrument(skip(config, args))]
pub fn install(config: &Config, args: &InstallArgs) -> Result<()> {
    let suffix = format!(".{PACKAGE_EXT}");
    let (package_name, sources_override) = match (&args.filename, &args.package_name) {
        (Some(filename), _) => {
            let name = filename
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let Some(stem) = name.strip_suffix(&suffix) else {
                bail!("bad filename");
            };
            let dir = match filename.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let dir = std::fs::canonicalize(&dir).unwrap_or(dir);
            (stem.to_string(), Some(vec![dir.display().to_string()]))
        }
        (None, Some(name)) => (name.clone(), args.repository_urls.clone()),
        (None, None) => bail!("missing package name"),
    };

    let domain = Domain::new(&args.domain_home);
    check_compatible(&domain)?;

    if args.skip_on_installed && domain.is_installed(&package_name) {
        config.print_verbose("skipping installed package");
        return Ok(());
    }

    let user = args.username.clone().unwrap_or_else(users::username);
    let group = args.groupname.clone().unwrap_or_else(users::groupname);
    // Re-ownership is only meaningful as root; resolving names for a plain
    // user would fail needlessly for -U/-G values.
    let owner = if geteuid().is_root() {
        Some(Owner::resolve(&user, &group)?)
    } else {
        None
    };

    let sources = match sources_override {
        Some(urls) => urls,
        None => source_lines(&domain.get_sources()),
    };

    let http = HttpClient::new()?;
    for source in &sources {
        let repo = Repository::new(config, &http, source);
        let Some(mut archive) = repo.get(&package_name) else {
            debug!("package {package_name} not found in source ({source})");
            continue;
        };
        config.print_verbose(&format!(
            "installing package ({package_name}) from repository ({source})"
        ));
        let package = Package::new(&domain, &package_name)?;
        package.install(config, &mut archive, owner.as_ref(), args.clobber, false)?;
        return Ok(());
    }
    bail!("could not find package");
}
