use super::ArchiveFormat;
use crate::error::{Result, SandboxError};
use crate::host::{HostCapabilities, Tool, run_captured};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use uuid::Uuid;

/**
 * Unpacks `archive` into `dest` and, when the archive wraps everything in a
 * single bootstrap directory (Arch's `root.x86_64/`), lifts that directory's
 * contents up so `dest` holds `/etc`, `/usr` and friends directly.
 */
pub fn extract_base_image(
    host: &HostCapabilities,
    archive: &Path,
    dest: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    let failure = |reason: String| SandboxError::ExtractionFailure {
        archive: archive.to_path_buf(),
        dest: dest.to_path_buf(),
        reason,
    };

    let format = ArchiveFormat::from_path(archive)
        .ok_or_else(|| failure("unsupported archive type".to_string()))?;
    host.require(&[Tool::Tar, format.tool()])?;

    std::fs::create_dir_all(dest).map_err(|e| failure(e.to_string()))?;

    info!("Extracting {} into {}", archive.display(), dest.display());
    let mut cmd = Command::new(host.path(Tool::Tar)?);
    cmd.arg("-x").arg("--numeric-owner").arg("-p");
    if let Some(flag) = format.tar_flag() {
        cmd.arg(flag);
    }
    cmd.arg("-f").arg(archive).arg("-C").arg(dest);
    run_captured(&mut cmd, timeout).map_err(|e| failure(e.to_string()))?;

    if let Some(wrapper) = flatten_bootstrap_root(dest).map_err(|e| {
        failure(format!("failed to flatten bootstrap root: {}", e))
    })? {
        info!("Flattened bootstrap root {}", wrapper.display());
    }

    Ok(())
}

/// A lone top level directory that looks like a root filesystem.
fn find_bootstrap_root(dest: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = std::fs::read_dir(dest)?;
    let Some(first) = entries.next().transpose()? else {
        return Ok(None);
    };
    if entries.next().is_some() {
        return Ok(None);
    }

    if !first.file_type()?.is_dir() {
        return Ok(None);
    }

    let path = first.path();
    let named_like_root =
        first.file_name().to_string_lossy().starts_with("root.");
    let holds_root_tree = ["etc", "usr"].iter().any(|d| {
        std::fs::symlink_metadata(path.join(d)).is_ok_and(|m| m.is_dir())
    });

    Ok((named_like_root || holds_root_tree).then_some(path))
}

/**
 * Moves the children of a bootstrap wrapper directory up into `dest` and removes
 * the wrapper. Returns the wrapper's original path if one was found.
 */
pub fn flatten_bootstrap_root(dest: &Path) -> std::io::Result<Option<PathBuf>> {
    let Some(wrapper) = find_bootstrap_root(dest)? else {
        return Ok(None);
    };

    // The wrapper may contain a child with its own name, get it out of the way
    let staging = dest.join(format!(".bootstrap-{}", Uuid::new_v4()));
    std::fs::rename(&wrapper, &staging)?;

    for entry in std::fs::read_dir(&staging)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        debug!("Moving {} to {}", entry.path().display(), target.display());
        std::fs::rename(entry.path(), target)?;
    }

    std::fs::remove_dir(&staging)?;
    Ok(Some(wrapper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_flatten_bootstrap_root() {
        let dir = tempfile::tempdir().unwrap();
        let wrapper = dir.path().join("root.x86_64");
        std::fs::create_dir_all(wrapper.join("etc")).unwrap();
        std::fs::create_dir_all(wrapper.join("usr/bin")).unwrap();
        std::fs::write(wrapper.join("etc/os-release"), "NAME=Arch").unwrap();
        symlink("usr/bin", wrapper.join("bin")).unwrap();

        let flattened = flatten_bootstrap_root(dir.path()).unwrap();
        assert_eq!(flattened, Some(wrapper.clone()));
        assert_eq!(names(dir.path()), vec!["bin", "etc", "usr"]);
        assert!(!wrapper.exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("etc/os-release")).unwrap(),
            "NAME=Arch"
        );
        assert!(
            std::fs::symlink_metadata(dir.path().join("bin"))
                .unwrap()
                .file_type()
                .is_symlink()
        );
    }

    #[test]
    fn test_flatten_wrapper_containing_its_own_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("usr/usr/lib")).unwrap();
        std::fs::create_dir_all(dir.path().join("usr/etc")).unwrap();

        flatten_bootstrap_root(dir.path()).unwrap();
        assert_eq!(names(dir.path()), vec!["etc", "usr"]);
        assert!(dir.path().join("usr/lib").is_dir());
    }

    #[test]
    fn test_flatten_leaves_real_roots_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("etc")).unwrap();
        std::fs::create_dir_all(dir.path().join("usr")).unwrap();
        assert_eq!(flatten_bootstrap_root(dir.path()).unwrap(), None);

        let single = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(single.path().join("data/files")).unwrap();
        assert_eq!(flatten_bootstrap_root(single.path()).unwrap(), None);
        assert_eq!(names(single.path()), vec!["data"]);
    }

    #[test]
    fn test_extract_flattens_wrapped_archive() {
        let host = HostCapabilities::probe();
        if host.require(&[Tool::Tar, Tool::Gzip]).is_err() {
            return;
        }

        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("root.x86_64/etc")).unwrap();
        std::fs::create_dir_all(src.path().join("root.x86_64/usr/bin")).unwrap();
        std::fs::write(src.path().join("root.x86_64/etc/hostname"), "arch\n")
            .unwrap();

        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("bootstrap.tar.gz");
        let status = Command::new("tar")
            .arg("-czf")
            .arg(&archive)
            .arg("-C")
            .arg(src.path())
            .arg("root.x86_64")
            .status()
            .unwrap();
        assert!(status.success());

        let dest = out.path().join("root");
        extract_base_image(&host, &archive, &dest, None).unwrap();
        assert_eq!(names(&dest), vec!["etc", "usr"]);
        assert_eq!(
            std::fs::read_to_string(dest.join("etc/hostname")).unwrap(),
            "arch\n"
        );
    }

    #[test]
    fn test_extract_corrupt_archive_fails() {
        let host = HostCapabilities::probe();
        if host.require(&[Tool::Tar, Tool::Gzip]).is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.tar.gz");
        std::fs::write(&archive, b"not an archive").unwrap();

        let err = extract_base_image(&host, &archive, &dir.path().join("root"), None)
            .unwrap_err();
        assert!(matches!(err, SandboxError::ExtractionFailure { .. }));
    }
}
