use crate::error::{Result, SandboxError};
use std::path::Path;

/**
 * Checks that a path can be spliced into overlayfs `lowerdir=`/`upperdir=`
 * options. Commas and colons separate option values there, so anything outside a
 * conservative character set is rejected.
 *
 * TODO: overlayfs accepts backslash-escaped commas and colons; escape them instead
 * of rejecting storage paths that contain them.
 */
pub fn check_path_for_mount_option_compatibility(path: &Path) -> Result<()> {
    let invalid = |reason: String| SandboxError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    };

    if path.components().count() == 0 {
        return Err(invalid("path is empty".to_string()));
    }

    path.components().try_for_each(|component| {
        let Some(component_str) = component.as_os_str().to_str() else {
            return Err(invalid("path is not valid UTF-8".to_string()));
        };

        match component_str.chars().find(|c| {
            !(c.is_alphanumeric()
                || matches!(c, '_' | '-' | '.' | '/' | '@' | '%' | '+'))
        }) {
            Some(c) => Err(invalid(format!(
                "character '{}' cannot be used in overlay mount options",
                c
            ))),
            None => Ok(()),
        }
    })
}
