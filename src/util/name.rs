use super::LOCK_DIR;
use crate::error::{Result, SandboxError};
use std::path::PathBuf;

/// Names reserved for entries that live next to sandboxes in the storage dir.
const RESERVED: [&str; 4] = [".", "..", ".cache", LOCK_DIR];

/**
 * Sandbox names and snapshot ids become directory and file names, so they must
 * be a single path component.
 */
pub fn check_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains('/') {
        Some("name contains '/'")
    } else if name.contains('\0') {
        Some("name contains a NUL byte")
    } else if RESERVED.contains(&name) {
        Some("name is reserved")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SandboxError::InvalidPath {
            path: PathBuf::from(name),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
