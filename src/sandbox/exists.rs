use std::path::Path;

use crate::sandbox::Sandbox;

/// A directory in the storage dir that holds a sandbox's layers.
pub fn is_sandbox_dir(path: &Path) -> bool {
    path.is_dir()
        && path.join("upper").is_dir()
        && path.join("work").is_dir()
        && path.join("overlay").is_dir()
}

impl Sandbox {
    pub fn exists(&self) -> bool {
        is_sandbox_dir(&self.base)
    }
}
