use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use log::trace;
use nix::fcntl::{Flock, FlockArg};

use crate::error::{Result, SandboxError};

/// Directory under the storage dir holding per-sandbox lock files, so they never
/// share a name with a sandbox.
pub const LOCK_DIR: &str = ".locks";

/// An exclusive advisory lock held for as long as the value lives. Lock files
/// are never removed: a waiter would end up holding a lock on an unlinked file
/// while a newcomer locks a fresh one.
pub struct Lock {
    path: PathBuf,
    #[allow(dead_code)]
    lock: Flock<File>,
}

impl Lock {
    /** Serializes lifecycle and snapshot operations on one sandbox name. */
    pub fn sandbox(storage_dir: &Path, sandbox_name: &str) -> Result<Lock> {
        Lock::acquire(
            storage_dir
                .join(LOCK_DIR)
                .join(format!("{}.lock", sandbox_name)),
        )
    }

    /** Serializes download/verify of one cached archive across sandboxes. */
    pub fn cache(cache_dir: &Path, key: &str) -> Result<Lock> {
        Lock::acquire(cache_dir.join(format!("{}.lock", key)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire(lock_file: PathBuf) -> Result<Lock> {
        trace!("Acquiring lock {}", lock_file.display());
        if let Some(parent) = lock_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SandboxError::Lock {
                path: lock_file.clone(),
                reason: format!("cannot create {}: {}", parent.display(), e),
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_file)
            .map_err(|e| SandboxError::Lock {
                path: lock_file.clone(),
                reason: e.to_string(),
            })?;

        let lock = Flock::lock(file, FlockArg::LockExclusive).map_err(
            |(_, e)| SandboxError::Lock {
                path: lock_file.clone(),
                reason: e.to_string(),
            },
        )?;

        trace!("Acquired lock {}", lock_file.display());
        Ok(Lock {
            path: lock_file,
            lock,
        })
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        trace!("Unlocking lock {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::fcntl::{Flock, FlockArg};

    #[test]
    fn test_lock_is_exclusive_until_dropped() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let lock = Lock::sandbox(dir.path(), "dev")?;
        assert_eq!(lock.path(), dir.path().join(".locks/dev.lock"));

        let contender = File::open(lock.path())?;
        let contender =
            match Flock::lock(contender, FlockArg::LockExclusiveNonblock) {
                Ok(_) => panic!("lock should be held"),
                Err((file, _)) => file,
            };

        drop(lock);
        assert!(
            Flock::lock(contender, FlockArg::LockExclusiveNonblock).is_ok()
        );
        Ok(())
    }

    #[test]
    fn test_lock_does_not_collide_with_sandbox_dirs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir(dir.path().join("x.lock"))?;
        let _lock = Lock::sandbox(dir.path(), "x")?;
        let _other = Lock::sandbox(dir.path(), "x.lock")?;
        assert!(dir.path().join("x.lock").is_dir());
        Ok(())
    }

    #[test]
    fn test_waiter_and_newcomer_are_serialized() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = dir.path().to_path_buf();
        let first = Lock::sandbox(&storage, "dev")?;
        let path = first.path().to_path_buf();

        let (acquired_tx, acquired_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let waiter = std::thread::spawn(move || {
            let lock = Lock::sandbox(&storage, "dev").unwrap();
            acquired_tx.send(()).unwrap();
            let _ = release_rx.recv();
            drop(lock);
        });

        std::thread::sleep(std::time::Duration::from_millis(100));
        drop(first);
        acquired_rx.recv()?;

        // The waiter holds the lock on the same file a newcomer would open
        let newcomer = File::open(&path)?;
        assert!(Flock::lock(newcomer, FlockArg::LockExclusiveNonblock).is_err());

        release_tx.send(())?;
        waiter.join().unwrap();
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_cache_lock_creates_cache_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache_dir = dir.path().join(".cache");
        let _lock = Lock::cache(&cache_dir, "image.tar.zst")?;
        assert!(cache_dir.join("image.tar.zst.lock").exists());
        Ok(())
    }
}
