//! Composes and tears down the union view of a sandbox.
//!
//! Mounting onto a merge point that is already mounted is host dependent: the
//! kernel stacks a second overlay on top of the first. We warn and carry on,
//! callers serialize per sandbox so this only happens after an unclean exit.

use crate::error::{Result, SandboxError};
use crate::host::{HostCapabilities, Tool, run_captured};
use crate::util::{
    check_path_for_mount_option_compatibility, get_mounts, is_mount_point,
    resolve_path,
};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

pub struct OverlayLayers<'a> {
    pub lower: &'a Path,
    pub upper: &'a Path,
    pub work: &'a Path,
    pub merged: &'a Path,
}

impl OverlayLayers<'_> {
    /*
     * index=off and metacopy=off keep the upper layer self describing, so a
     * snapshot of it can be restored on its own later.
     */
    pub fn mount_options(&self) -> Result<String> {
        for path in [self.lower, self.upper, self.work] {
            check_path_for_mount_option_compatibility(path)?;
        }
        Ok(format!(
            "lowerdir={},upperdir={},workdir={},index=off,metacopy=off",
            self.lower.display(),
            self.upper.display(),
            self.work.display()
        ))
    }
}

pub fn mount(
    host: &HostCapabilities,
    layers: &OverlayLayers,
    timeout: Option<Duration>,
) -> Result<()> {
    for path in [layers.lower, layers.upper, layers.work, layers.merged] {
        if !path.is_dir() {
            return Err(SandboxError::InvalidPath {
                path: path.to_path_buf(),
                reason: "overlay layer directory does not exist".to_string(),
            });
        }
    }
    let options = layers.mount_options()?;

    if is_mount_point(layers.merged)? {
        warn!(
            "{} is already mounted, mounting again stacks a second overlay on it",
            layers.merged.display()
        );
    }

    debug!("Mounting overlay at {}", layers.merged.display());
    run_captured(
        Command::new(host.path(Tool::Mount)?)
            .args(["-t", "overlay", "overlay", "-o"])
            .arg(options)
            .arg(layers.merged),
        timeout,
    )
    .map_err(|source| SandboxError::MountFailure {
        target: layers.merged.to_path_buf(),
        source,
    })?;

    info!("Overlay mounted at {}", layers.merged.display());
    Ok(())
}

/**
 * Unmounts everything stacked under `merged` (bind mounts first, deepest first),
 * then `merged` itself. Keeps going after a failure and returns the first one.
 */
pub fn unmount(
    host: &HostCapabilities,
    merged: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    let umount = host.path(Tool::Umount)?;

    let resolved = resolve_path(merged);
    let mut targets: Vec<PathBuf> = get_mounts(merged)?
        .into_iter()
        .filter(|m| *m != resolved)
        .collect();
    targets.push(merged.to_path_buf());

    let mut first_failure = None;
    for target in targets {
        debug!("Unmounting {}", target.display());
        if let Err(source) =
            run_captured(Command::new(umount).arg(&target), timeout)
        {
            error!("Failed to unmount {}: {}", target.display(), source);
            first_failure.get_or_insert(SandboxError::UnmountFailure {
                target,
                source,
            });
        }
    }

    match first_failure {
        Some(e) => Err(e),
        None => {
            info!("Overlay unmounted from {}", merged.display());
            Ok(())
        }
    }
}
