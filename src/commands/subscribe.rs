use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::Config;
use crate::domain::Domain;
use crate::fsops;

use super::check_is_domain;

const PROFILE_STAMP_START: &str = "# -- ssm profile/login start -- automatically added";
const PROFILE_STAMP_END: &str = "# -- ssm profile/login end -- automatically added";

#[derive(clap::Args, Debug)]
pub struct SubscribeArgs {
    /// Domain to use at login
    #[arg(
        short = 'd',
        long = "domain-home",
        env = "SSM_DOMAIN_HOME",
        value_name = "PATH"
    )]
    pub domain_home: PathBuf,

    /// Configure the current user's shell startup files
    #[arg(long, conflicts_with = "system")]
    pub user: bool,

    /// Configure the system-wide shell startup files (admin only)
    #[arg(long)]
    pub system: bool,
}

struct SubscribePaths {
    login: PathBuf,
    profile: PathBuf,
    ssmd_dir: PathBuf,
    ssmd_login: PathBuf,
    ssmd_profile: PathBuf,
}

fn subscribe_paths(user: bool) -> Result<SubscribePaths> {
    let (login, profile, ssmd_dir) = if user {
        let home = dirs::home_dir().context("cannot determine home directory")?;
        (
            home.join(".login"),
            home.join(".profile"),
            home.join(".ssm.d"),
        )
    } else {
        (
            PathBuf::from("/etc/csh.login"),
            PathBuf::from("/etc/profile"),
            PathBuf::from("/etc/ssm.d"),
        )
    };
    Ok(SubscribePaths {
        login,
        profile,
        ssmd_login: ssmd_dir.join("login"),
        ssmd_profile: ssmd_dir.join("profile"),
        ssmd_dir,
    })
}

fn profile_block(sourced: &Path) -> String {
    format!(
        "\n{PROFILE_STAMP_START}\nif [ -r {p} ]; then\n    . {p}\nfi\n{PROFILE_STAMP_END}\n",
        p = sourced.display()
    )
}

fn login_block(sourced: &Path) -> String {
    format!(
        "\n{PROFILE_STAMP_START}\nif ( -r {p} ) then\n    source {p}\nendif\n{PROFILE_STAMP_END}\n",
        p = sourced.display()
    )
}

/// Append `block` to `path` unless the stamp block is already present.
fn append_stamped_block(path: &Path, block: &str) -> Result<()> {
    let current = fsops::read_string_or(path, "");
    if current.contains(PROFILE_STAMP_END) {
        return Ok(());
    }
    fsops::write_string(path, &format!("{current}{block}"))
}

/// Update shell startup profiles to automatically configure access to a
/// domain.
#[tracing::instrument(skip(config, args))]
pub fn subscribe(config: &Config, args: &SubscribeArgs) -> Result<()> {
    if !args.user && !args.system {
        bail!("must specify --user or --system");
    }
    let domain = Domain::new(&args.domain_home);
    check_is_domain(&domain)?;

    let paths = subscribe_paths(args.user)?;

    // Hook the stamped include block into the shell startup files, at most
    // once.
    append_stamped_block(&paths.login, &login_block(&paths.ssmd_login))?;
    append_stamped_block(&paths.profile, &profile_block(&paths.ssmd_profile))?;

    // Point the subscription at this domain's support files.
    fsops::mkdirs(&paths.ssmd_dir)?;
    if paths.ssmd_login.symlink_metadata().is_ok() || paths.ssmd_profile.symlink_metadata().is_ok()
    {
        if !config.confirm("Overwrite the current subscription (y/n)?")? {
            bail!("operation aborted");
        }
    }
    fsops::remove(&paths.ssmd_login)?;
    fsops::remove(&paths.ssmd_profile)?;
    fsops::symlink(&domain.login_path(), &paths.ssmd_login)?;
    fsops::symlink(&domain.profile_path(), &paths.ssmd_profile)?;
    Ok(())
}
