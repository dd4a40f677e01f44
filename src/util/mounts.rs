use crate::error::{Result, SandboxError};
use std::ffi::CStr;
use std::path::{Path, PathBuf};

/// `path` with symlinks resolved, the form the kernel reports mount points in.
/// Paths that don't exist yet are returned unchanged.
pub fn resolve_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Every mount point at or below `base`, deepest first so they can be
/// unmounted in order. Returned paths are symlink free.
pub fn get_mounts(base: &Path) -> Result<Vec<PathBuf>> {
    let base = resolve_path(base);
    let mut mounts = Vec::new();

    let system_mounts =
        unsafe { libc::setmntent(c"/proc/mounts".as_ptr(), c"r".as_ptr()) };

    if system_mounts.is_null() {
        return Err(SandboxError::io(
            "failed to open /proc/mounts",
            std::io::Error::last_os_error(),
        ));
    }

    loop {
        let mnt = unsafe { libc::getmntent(system_mounts) };
        if mnt.is_null() {
            break;
        }

        let mnt_dir = String::from(unsafe {
            CStr::from_ptr((*mnt).mnt_dir).to_string_lossy()
        });

        let mnt_dir = PathBuf::from(mnt_dir);
        if mnt_dir.starts_with(&base) {
            mounts.push(mnt_dir);
        }
    }

    unsafe { libc::endmntent(system_mounts) };

    mounts.sort_by(|a, b| b.cmp(a));
    mounts.dedup();

    Ok(mounts)
}

pub fn is_mount_point(path: &Path) -> Result<bool> {
    let path = resolve_path(path);
    Ok(get_mounts(&path)?.iter().any(|m| *m == path))
}
