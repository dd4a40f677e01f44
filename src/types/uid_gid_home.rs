use nix::unistd::{Gid, Uid};
use std::path::PathBuf;

/// The user who invoked us, even when running under sudo or setuid.
#[derive(Debug, Clone)]
pub struct UidGidHome {
    pub uid: Uid,
    pub gid: Gid,
    pub home: PathBuf,
}
