mod expand_tilde;
mod lock;
mod mkdir;
mod mount_options;
mod mounts;
mod name;
mod output;
mod resolve_uid_gid_home;

pub use expand_tilde::*;
pub use lock::*;
pub use mkdir::*;
pub use mount_options::*;
pub use mounts::*;
pub use name::*;
pub use output::*;
pub use resolve_uid_gid_home::*;
