//! Lifecycle hook-script execution.

use std::fs::File;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use log::debug;

use crate::config::Config;
use crate::domain::Domain;

use super::Package;

const INSTALL_STEPS: [&str; 2] = ["post-install", "pre-uninstall"];
const PUBLISH_STEPS: [&str; 4] = [
    "pre-publish",
    "post-publish",
    "pre-unpublish",
    "post-unpublish",
];

impl Package<'_> {
    /// Run the optional `<package>/.ssm.d/<step>` hook.
    ///
    /// Install/uninstall hooks receive the domain and package paths;
    /// publish/unpublish hooks additionally receive the publishing domain
    /// path. A script without the executable bit or a `#!` line still runs,
    /// with a warning, via `/bin/sh`. A non-zero exit is fatal.
    #[tracing::instrument(skip(self, config, pub_domain))]
    pub fn execute_script(
        &self,
        config: &Config,
        step: &str,
        pub_domain: Option<&Domain>,
    ) -> Result<()> {
        let script = self.path().join(".ssm.d").join(step);
        if !script.is_file() {
            return Ok(());
        }
        config.print_verbose(&format!("executing {step} script"));

        let mut args: Vec<PathBuf> = vec![
            self.domain().path().to_path_buf(),
            self.path().to_path_buf(),
        ];
        if PUBLISH_STEPS.contains(&step) {
            let pub_domain =
                pub_domain.ok_or_else(|| anyhow!("missing publish domain for {step} script"))?;
            args.push(pub_domain.path().to_path_buf());
        } else if !INSTALL_STEPS.contains(&step) {
            debug!("unknown script step ({step})");
            return Ok(());
        }

        let executable = script
            .metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
        if !executable {
            config.print_warning(&format!(
                "setup script ({}) is not executable",
                script.display()
            ));
        }

        let mut command = if executable && has_shebang(&script) {
            Command::new(&script)
        } else {
            config.print_warning("using /bin/sh to run pre-/post- script");
            let mut sh = Command::new("/bin/sh");
            sh.arg(&script);
            sh
        };
        command.args(&args);

        let status = command
            .status()
            .with_context(|| format!("failed to run {step} script"))?;
        if !status.success() {
            bail!("execute script failed");
        }
        Ok(())
    }
}

fn has_shebang(path: &Path) -> bool {
    let mut buf = [0u8; 2];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut buf))
        .map(|_| &buf == b"#!")
        .unwrap_or(false)
}
