pub mod archive;
pub mod commands;
pub mod config;
pub mod display;
pub mod domain;
pub mod fsops;
pub mod http;
pub mod package;
pub mod repository;
pub mod users;

/// Version of the running tool; stamped into domains at create/update time.
pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

/// Leading version component used for domain compatibility checks.
pub fn version_major() -> &'static str {
    VERSION_STRING.split('.').next().unwrap_or(VERSION_STRING)
}

pub const DEFAULT_DOMAIN_LABEL: &str = "No label";
pub const DEFAULT_REPO_SOURCE: &str = "http://ssm/main";

/// Filename extension of package archives.
pub const PACKAGE_EXT: &str = "ssm";

pub const MSG_INCOMPATIBLE_DOMAIN: &str = "one or more incompatible domains";
