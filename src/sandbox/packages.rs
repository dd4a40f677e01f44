use super::Sandbox;
use crate::error::{Result, SandboxError};
use crate::host::{HostCapabilities, Tool, run_interactive};
use log::info;
use std::process::Command;
use std::time::Duration;

impl Sandbox {
    /// Installs packages one at a time with pacman inside the mounted overlay.
    /// pacman's output goes straight to the user's terminal.
    pub(super) fn install_packages(
        &self,
        host: &HostCapabilities,
        packages: &[String],
        timeout: Option<Duration>,
    ) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let chroot = host.path(Tool::Chroot)?;

        for package in packages {
            info!("Installing {} into sandbox {}", package, self.name);
            run_interactive(
                Command::new(chroot)
                    .arg(&self.overlay_dir)
                    .args(["pacman", "-S", "--noconfirm"])
                    .arg(package),
                timeout,
            )
            .map_err(|source| SandboxError::PackageInstallFailure {
                package: package.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_no_packages_needs_no_chroot() {
        let sandbox = Sandbox::from_location(Path::new("/s"), "dev", false, "https://x/a.tar.zst");
        assert!(
            sandbox
                .install_packages(&HostCapabilities::default(), &[], None)
                .is_ok()
        );
    }

    #[test]
    fn test_first_failing_package_stops_install() {
        let sandbox = Sandbox::from_location(Path::new("/s"), "dev", false, "https://x/a.tar.zst");
        let host = HostCapabilities::from_tools([(
            Tool::Chroot,
            which::which("false").unwrap(),
        )]);
        let err = sandbox
            .install_packages(&host, &["git".to_string(), "vim".to_string()], None)
            .unwrap_err();
        match err {
            SandboxError::PackageInstallFailure { package, source } => {
                assert_eq!(package, "git");
                assert_eq!(source.exit_code(), Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
