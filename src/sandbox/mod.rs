mod bind_mounts;
mod cleanup;
mod exists;
mod launch;
mod packages;
mod sandbox_struct;
mod setup;

pub use bind_mounts::resolve_bind_target;
pub use cleanup::*;
pub use exists::is_sandbox_dir;
pub use sandbox_struct::*;
