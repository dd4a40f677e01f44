//! Base image acquisition: download into a shared cache, verify, unpack into a
//! sandbox's lower layer and repair ownership.

mod acquire;
mod extract;
mod format;
mod permissions;

pub use acquire::*;
pub use extract::*;
pub use format::*;
pub use permissions::*;
