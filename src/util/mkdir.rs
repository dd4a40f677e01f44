use anyhow::{Context, Result, anyhow};
use nix::unistd::{Gid, Uid, chown};
use std::path::Path;

/* Makes the directory (and any missing parents) if it doesn't exist, handing
 * ownership of the directories we created to uid/gid. Existing directories are
 * left as they are. Errors if the path exists but is not a directory.
 */
pub fn mkdir(path: &Path, uid: Uid, gid: Gid) -> Result<()> {
    if path.exists() {
        let metadata = std::fs::symlink_metadata(path)
            .context(format!("failed to stat {}", path.display()))?;
        if !metadata.is_dir() {
            return Err(anyhow!(
                "Directory {} already exists but is not a directory",
                path.display()
            ));
        }
        return Ok(());
    }

    let mut created = Vec::new();
    let mut current = Some(path);
    while let Some(dir) = current {
        if dir.exists() {
            break;
        }
        created.push(dir.to_path_buf());
        current = dir.parent();
    }

    std::fs::create_dir_all(path)
        .context(format!("Failed to create directory {}", path.display()))?;

    for dir in created.iter().rev() {
        chown(dir, Some(uid), Some(gid)).context(format!(
            "Failed to chown directory {}",
            dir.display()
        ))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{getgid, getuid};

    #[test]
    fn test_mkdir_creates_parents() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a/b/c");
        mkdir(&path, getuid(), getgid())?;
        assert!(path.is_dir());

        // idempotent
        mkdir(&path, getuid(), getgid())?;
        Ok(())
    }

    #[test]
    fn test_mkdir_failure_paths() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("file");
        std::fs::write(&path, "test")?;
        assert!(mkdir(&path, getuid(), getgid()).is_err());

        if !getuid().is_root() {
            // can't chown to somebody else without privileges
            assert!(
                mkdir(&dir.path().join("other"), Uid::from_raw(123456), getgid())
                    .is_err()
            );
        }
        Ok(())
    }
}
