//! Subcommand entry points: thin wrappers that resolve a domain, optionally
//! a repository, and drive the core through its state transitions.

mod cloned;
mod created;
mod find;
mod freezed;
mod install;
mod listd;
mod listdh;
mod listr;
mod publish;
mod showd;
mod subscribe;
mod unfreezed;
mod uninstall;
mod unpublish;
mod updated;

pub use cloned::{ClonedArgs, cloned};
pub use created::{CreatedArgs, created};
pub use find::{FindArgs, FindType, find};
pub use freezed::{FreezedArgs, freezed};
pub use install::{InstallArgs, install};
pub use listd::{ListdArgs, listd};
pub use listdh::{ListdhArgs, listdh};
pub use listr::{ListrArgs, listr};
pub use publish::{PublishArgs, publish};
pub use showd::{ShowdArgs, ShowdSelection, showd};
pub use subscribe::{SubscribeArgs, subscribe};
pub use unfreezed::{UnfreezedArgs, unfreezed};
pub use uninstall::{UninstallArgs, uninstall};
pub use unpublish::{UnpublishArgs, unpublish};
pub use updated::{UpdatedArgs, UpdatedSettings, updated};

use anyhow::{Result, bail};

use crate::MSG_INCOMPATIBLE_DOMAIN;
use crate::domain::Domain;

pub(crate) fn check_compatible(domain: &Domain) -> Result<()> {
    if !domain.is_compatible() {
        bail!("{MSG_INCOMPATIBLE_DOMAIN}");
    }
    Ok(())
}

pub(crate) fn check_is_domain(domain: &Domain) -> Result<()> {
    if !domain.is_domain() {
        bail!("cannot find domain ({})", domain.path().display());
    }
    Ok(())
}

/// Split a sources setting into its non-empty source lines.
pub(crate) fn source_lines(sources: &str) -> Vec<String> {
    sources
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
