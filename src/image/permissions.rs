use crate::error::{Result, SandboxError};
use log::{debug, info};
use nix::unistd::{Gid, Uid};
use std::os::unix::fs::{PermissionsExt, lchown};
use std::path::Path;
use walkdir::WalkDir;

/// Paths, relative to the root filesystem, that must end up executable.
pub const KNOWN_EXECUTABLES: [&str; 7] = [
    "bin/bash",
    "bin/sh",
    "usr/bin/bash",
    "usr/bin/sh",
    "usr/bin/env",
    "usr/bin/pacman",
    "usr/bin/arch-chroot",
];

const EXEC_BITS: u32 = 0o111;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: Uid,
    pub gid: Gid,
}

impl Owner {
    pub fn root() -> Owner {
        Owner {
            uid: Uid::from_raw(0),
            gid: Gid::from_raw(0),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PermissionFixStats {
    pub entries: usize,
    pub symlinks_skipped: usize,
    pub made_executable: usize,
}

/**
 * Re-owns every file and directory under `root` to `owner` and makes sure the
 * known executables carry exec bits. Symlinks are neither followed nor touched.
 *
 * chown(2) drops setuid/setgid bits, so each entry's original mode is put back
 * afterwards.
 */
pub fn fix_permissions(root: &Path, owner: Owner) -> Result<PermissionFixStats> {
    let failure = |path: &Path, reason: String| SandboxError::PermissionFixFailure {
        path: path.to_path_buf(),
        reason,
    };

    let mut stats = PermissionFixStats::default();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            failure(&path, e.to_string())
        })?;
        let path = entry.path();

        if entry.path_is_symlink() {
            stats.symlinks_skipped += 1;
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| failure(path, e.to_string()))?;
        let original_mode = metadata.permissions().mode() & 0o7777;

        lchown(path, Some(owner.uid.as_raw()), Some(owner.gid.as_raw()))
            .map_err(|e| failure(path, format!("chown: {}", e)))?;

        let mut mode = original_mode;
        if metadata.is_file() && is_known_executable(root, path) {
            if mode & EXEC_BITS != EXEC_BITS {
                stats.made_executable += 1;
            }
            mode |= EXEC_BITS;
        }

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| failure(path, format!("chmod {:o}: {}", mode, e)))?;

        stats.entries += 1;
    }

    debug!(
        "Permission fix skipped {} symlinks, made {} files executable",
        stats.symlinks_skipped, stats.made_executable
    );
    info!(
        "Fixed ownership of {} entries under {}",
        stats.entries,
        root.display()
    );
    Ok(stats)
}

fn is_known_executable(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .is_ok_and(|rel| KNOWN_EXECUTABLES.iter().any(|k| rel == Path::new(k)))
}
