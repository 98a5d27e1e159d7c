//! Username/group resolution and extraction re-ownership.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use nix::unistd::{self, Gid, Group, Uid, User};

/// Login name of the current user, falling back to the numeric uid.
pub fn username() -> String {
    let uid = unistd::getuid();
    match User::from_uid(uid) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

/// Group name of the current user, falling back to the numeric gid.
pub fn groupname() -> String {
    let gid = unistd::getgid();
    match Group::from_gid(gid) {
        Ok(Some(group)) => group.name,
        _ => gid.to_string(),
    }
}

/// Resolved ownership applied to extracted archive members.
#[derive(Debug, Clone, Copy)]
pub struct Owner {
    uid: Uid,
    gid: Gid,
}

impl Owner {
    pub fn resolve(user: &str, group: &str) -> Result<Self> {
        let user = User::from_name(user)
            .with_context(|| format!("failed to look up user ({user})"))?
            .ok_or_else(|| anyhow!("unknown user ({user})"))?;
        let group = Group::from_name(group)
            .with_context(|| format!("failed to look up group ({group})"))?
            .ok_or_else(|| anyhow!("unknown group ({group})"))?;
        Ok(Self {
            uid: user.uid,
            gid: group.gid,
        })
    }

    /// Re-own `path`. Ownership changes are only meaningful when running as
    /// root; symlink members are left alone.
    pub fn apply(&self, path: &Path) -> Result<()> {
        if !unistd::geteuid().is_root() {
            return Ok(());
        }
        let meta = path
            .symlink_metadata()
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if meta.file_type().is_symlink() {
            return Ok(());
        }
        unistd::chown(path, Some(self.uid), Some(self.gid))
            .with_context(|| format!("failed to chown {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_and_groupname_are_nonempty() {
        assert!(!username().is_empty());
        assert!(!groupname().is_empty());
    }

    #[test]
    fn test_resolve_current_user() {
        let owner = Owner::resolve(&username(), &groupname());
        assert!(owner.is_ok());
    }

    #[test]
    fn test_resolve_unknown_user_fails() {
        assert!(Owner::resolve("no-such-user-zzz", "no-such-group-zzz").is_err());
    }

    #[test]
    fn test_apply_is_noop_for_non_root() {
        if unistd::geteuid().is_root() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, "x").unwrap();
        let owner = Owner::resolve(&username(), &groupname()).unwrap();
        owner.apply(&path).unwrap();
    }
}
