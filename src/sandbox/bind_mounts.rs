use super::Sandbox;
use crate::config::BindMount;
use crate::error::{Result, SandboxError};
use crate::host::{HostCapabilities, Tool, run_captured};
use log::{debug, info};
use std::fs::OpenOptions;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/**
 * Maps a bind target, written as an absolute path inside the sandbox, onto the
 * merged overlay. Anything that could climb out of the overlay is refused.
 */
pub fn resolve_bind_target(overlay_dir: &Path, target: &Path) -> Option<PathBuf> {
    let mut resolved = overlay_dir.to_path_buf();
    for component in target.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => resolved.push(part),
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

/**
 * Creates `target` and any missing parents one component at a time below
 * `overlay_dir`. Symlinks are refused anywhere on the way: the sandbox controls
 * the overlay's contents, and following one would put the mount on the host.
 */
fn create_bind_target(overlay_dir: &Path, target: &Path, is_dir: bool) -> Result<(), String> {
    let relative = target
        .strip_prefix(overlay_dir)
        .map_err(|_| "target must stay inside the sandbox".to_string())?;

    let mut current = overlay_dir.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        current.push(component);
        let last = components.peek().is_none();
        let want_dir = !last || is_dir;

        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(format!("{} is a symlink", current.display()));
            }
            Ok(meta) if want_dir && !meta.is_dir() => {
                return Err(format!("{} is not a directory", current.display()));
            }
            Ok(meta) if !want_dir && meta.is_dir() => {
                return Err(format!("{} is a directory", current.display()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let created = if want_dir {
                    std::fs::create_dir(&current)
                } else {
                    OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .open(&current)
                        .map(|_| ())
                };
                created.map_err(|e| format!("cannot create {}: {}", current.display(), e))?;
            }
            Err(e) => return Err(format!("cannot inspect {}: {}", current.display(), e)),
        }
    }
    Ok(())
}

impl Sandbox {
    pub(super) fn bind_mounts(
        &self,
        host: &HostCapabilities,
        mounts: &[BindMount],
        timeout: Option<Duration>,
    ) -> Result<()> {
        for mount in mounts {
            self.bind_mount(host, mount, timeout)?;
        }
        Ok(())
    }

    fn bind_mount(
        &self,
        host: &HostCapabilities,
        mount: &BindMount,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let failure = |target: &Path, reason: String| SandboxError::BindMountFailure {
            source_path: mount.source.clone(),
            target: target.to_path_buf(),
            reason,
        };

        let target = resolve_bind_target(&self.overlay_dir, &mount.target)
            .ok_or_else(|| {
                failure(&mount.target, "target must stay inside the sandbox".to_string())
            })?;

        let source_metadata = std::fs::metadata(&mount.source)
            .map_err(|e| failure(&target, format!("source is not accessible: {}", e)))?;

        create_bind_target(&self.overlay_dir, &target, source_metadata.is_dir())
            .map_err(|reason| failure(&target, reason))?;

        debug!("Bind mounting {}", mount);
        run_captured(
            Command::new(host.path(Tool::Mount)?)
                .arg("--bind")
                .arg(&mount.source)
                .arg(&target),
            timeout,
        )
        .map_err(|e| failure(&target, e.to_string()))?;

        info!("Mounted {} at {}", mount.source.display(), mount.target.display());
        Ok(())
    }
}
