//! Point-in-time archives of a sandbox's upper layer.
//!
//! Snapshots live under `<sandbox>/snapshots/<id>.tar.zst`. Only the upper layer
//! is archived; the lower layer is rebuilt from the cached image.

use crate::error::{Result, SandboxError};
use crate::host::{HostCapabilities, Tool, run_captured};
use crate::util::check_name;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime};

pub const SNAPSHOT_DIR: &str = "snapshots";
pub const SNAPSHOT_EXTENSION: &str = "tar.zst";
const UPPER_DIR: &str = "upper";

/// Overlay whiteouts and opaque dirs are stored in trusted.overlay.* xattrs.
/// Naming any include pattern limits tar to the listed namespaces, so file
/// capabilities and user xattrs have to be listed as well.
const XATTR_ARGS: [&str; 6] = [
    "--xattrs",
    "--xattrs-include=trusted.overlay.*",
    "--xattrs-include=security.capability",
    "--xattrs-include=user.*",
    "--acls",
    "--numeric-owner",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub id: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

pub fn snapshot_path(sandbox_base: &Path, id: &str) -> PathBuf {
    sandbox_base
        .join(SNAPSHOT_DIR)
        .join(format!("{}.{}", id, SNAPSHOT_EXTENSION))
}

/**
 * Archives the upper layer as snapshot `id`, replacing any earlier snapshot with
 * the same id. The archive is written beside its final name and renamed into
 * place, so an interrupted save leaves the previous snapshot untouched.
 */
pub fn save(
    host: &HostCapabilities,
    sandbox_base: &Path,
    id: &str,
    timeout: Option<Duration>,
) -> Result<PathBuf> {
    let failure = |reason: String| SandboxError::SnapshotSaveFailure {
        snapshot: id.to_string(),
        reason,
    };

    check_name(id)?;
    host.require(&[Tool::Tar, Tool::Zstd])?;

    let upper = sandbox_base.join(UPPER_DIR);
    if !upper.is_dir() {
        return Err(failure(format!(
            "upper layer {} does not exist",
            upper.display()
        )));
    }

    let path = snapshot_path(sandbox_base, id);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| {
            failure(format!("cannot create {}: {}", dir.display(), e))
        })?;
    }

    let mut part = path.clone().into_os_string();
    part.push(".part");
    let part = PathBuf::from(part);

    debug!("Archiving {} into {}", upper.display(), part.display());
    let result = run_captured(
        Command::new(host.path(Tool::Tar)?)
            .args(XATTR_ARGS)
            .arg("--zstd")
            .arg("-cf")
            .arg(&part)
            .arg("-C")
            .arg(&upper)
            .arg("."),
        timeout,
    );
    if let Err(e) = result {
        let _ = std::fs::remove_file(&part);
        return Err(failure(e.to_string()));
    }

    std::fs::rename(&part, &path).map_err(|e| {
        let _ = std::fs::remove_file(&part);
        failure(format!("cannot move archive into place: {}", e))
    })?;

    info!("Saved snapshot {} to {}", id, path.display());
    Ok(path)
}

/**
 * Replaces the upper layer with the contents of snapshot `id`.
 *
 * Must not be called while the sandbox's overlay is mounted. If unpacking fails
 * part way the upper layer is left partially populated.
 */
pub fn restore(
    host: &HostCapabilities,
    sandbox_base: &Path,
    id: &str,
    timeout: Option<Duration>,
) -> Result<()> {
    let failure = |reason: String| SandboxError::SnapshotRestoreFailure {
        snapshot: id.to_string(),
        reason,
    };

    check_name(id)?;
    host.require(&[Tool::Tar, Tool::Zstd])?;

    let path = snapshot_path(sandbox_base, id);
    if !path.is_file() {
        return Err(failure(format!("{} does not exist", path.display())));
    }

    let upper = sandbox_base.join(UPPER_DIR);
    match std::fs::remove_dir_all(&upper) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(failure(format!(
                "cannot clear {}: {}",
                upper.display(),
                e
            )));
        }
    }
    std::fs::create_dir_all(&upper).map_err(|e| {
        failure(format!("cannot create {}: {}", upper.display(), e))
    })?;

    debug!("Unpacking {} into {}", path.display(), upper.display());
    run_captured(
        Command::new(host.path(Tool::Tar)?)
            .args(XATTR_ARGS)
            .arg("-p")
            .arg("--zstd")
            .arg("-xf")
            .arg(&path)
            .arg("-C")
            .arg(&upper),
        timeout,
    )
    .map_err(|e| failure(e.to_string()))?;

    info!("Restored snapshot {} into {}", id, upper.display());
    Ok(())
}

/// Snapshots of a sandbox sorted by id. No snapshots directory means none.
pub fn list(sandbox_base: &Path) -> Result<Vec<SnapshotInfo>> {
    let dir = sandbox_base.join(SNAPSHOT_DIR);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(SandboxError::io(
                format!("cannot read {}", dir.display()),
                e,
            ));
        }
    };

    let suffix = format!(".{}", SNAPSHOT_EXTENSION);
    let mut snapshots = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            SandboxError::io(format!("cannot read {}", dir.display()), e)
        })?;
        let file_name = entry.file_name();
        let Some(id) = file_name
            .to_str()
            .and_then(|name| name.strip_suffix(&suffix))
        else {
            continue;
        };

        let metadata = entry.metadata().map_err(|e| {
            SandboxError::io(format!("cannot stat {}", entry.path().display()), e)
        })?;
        if !metadata.is_file() {
            continue;
        }

        snapshots.push(SnapshotInfo {
            id: id.to_string(),
            path: entry.path(),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    snapshots.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(snapshots)
}
