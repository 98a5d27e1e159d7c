use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;
use crate::display;
use crate::domain::Domain;
use crate::package::Package;

use super::{check_compatible, check_is_domain};

#[derive(clap::Args, Debug)]
pub struct ListdArgs {
    /// Domain to list
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,

    /// Package name pattern to match (wildcards * and ? supported)
    #[arg(short = 'p', long = "package-name", value_name = "PATTERN")]
    pub pattern: Option<String>,
}

/// List a domain's packages with their state flags.
#[tracing::instrument(skip(_config, args))]
pub fn listd(_config: &Config, args: &ListdArgs) -> Result<()> {
    let domain = Domain::new(&args.domain_home);
    check_is_domain(&domain)?;
    check_compatible(&domain)?;

    let package_names = domain.get_package_names(args.pattern.as_deref())?;
    let lines = state_lines(&domain, &package_names)?;
    if !lines.is_empty() {
        println!(
            "==========  {} ({})  ==========",
            domain.path().display(),
            domain.get_label()
        );
        display::print_columns(&lines, display::terminal_width());
    }
    Ok(())
}

/// One `"<flags> <name>"` line per package; packages published to a foreign
/// platform are tagged with that platform.
pub(crate) fn state_lines(domain: &Domain, package_names: &[String]) -> Result<Vec<String>> {
    let published_platforms = domain.get_published_platforms();
    let mut lines = Vec::new();
    for name in package_names {
        let package = Package::new(domain, name)?;
        if published_platforms.iter().any(|p| p == package.platform()) {
            let mut listed = false;
            for platform in &published_platforms {
                let state = domain.get_package_state(name, Some(platform))?;
                if state.is_empty() || state == "I" {
                    continue;
                }
                if package.platform() == platform {
                    lines.push(format!("{state:<2} {name}"));
                } else {
                    lines.push(format!("{state:<2} {name} ({platform})"));
                }
                listed = true;
            }
            // Installed-only packages still show up once.
            if !listed {
                let state = domain.get_package_state(name, None)?;
                lines.push(format!("{state:<2} {name}"));
            }
        } else {
            let state = domain.get_package_state(name, None)?;
            lines.push(format!("{state:<2} {name}"));
        }
    }
    Ok(lines)
}
