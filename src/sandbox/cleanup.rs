use super::{Sandbox, SandboxState};
use crate::error::{Result, SandboxError};
use crate::host::HostCapabilities;
use crate::overlay;
use crate::util::get_mounts;
use log::{info, warn};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Persisted,
    Destroyed,
}

/// What cleanup did. An unmount failure doesn't stop cleanup but is kept here
/// so the caller can report it.
#[derive(Debug)]
pub struct CleanupReport {
    pub outcome: CleanupOutcome,
    pub unmount_failure: Option<SandboxError>,
}

impl Sandbox {
    /**
     * Unmounts the overlay, then keeps or deletes the sandbox depending on
     * `persist`. Deleting is refused while anything is still mounted below the
     * sandbox, since removing through a live bind mount would delete host files.
     */
    pub fn cleanup(
        &mut self,
        host: &HostCapabilities,
        timeout: Option<Duration>,
    ) -> Result<CleanupReport> {
        let unmount_failure = overlay::unmount(host, &self.overlay_dir, timeout).err();
        if let Some(e) = &unmount_failure {
            warn!("Sandbox {} may still be mounted: {}", self.name, e);
        }
        self.state = SandboxState::Unmounted;

        if self.persist {
            self.state = SandboxState::Persisted;
            info!("Sandbox {} persisted at {}", self.name, self.base.display());
            return Ok(CleanupReport {
                outcome: CleanupOutcome::Persisted,
                unmount_failure,
            });
        }

        self.remove()?;
        Ok(CleanupReport {
            outcome: CleanupOutcome::Destroyed,
            unmount_failure,
        })
    }

    /// Deletes the sandbox's directory tree. Refuses while anything below it is
    /// still mounted.
    pub fn remove(&mut self) -> Result<()> {
        if let Some(mount) = get_mounts(&self.base)?.first() {
            return Err(SandboxError::CleanupDeleteFailure {
                path: self.base.clone(),
                source: std::io::Error::other(format!(
                    "{} is still mounted",
                    mount.display()
                )),
            });
        }

        match std::fs::remove_dir_all(&self.base) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SandboxError::CleanupDeleteFailure {
                    path: self.base.clone(),
                    source,
                });
            }
        }

        self.state = SandboxState::Destroyed;
        info!("Sandbox {} destroyed", self.name);
        Ok(())
    }
}
