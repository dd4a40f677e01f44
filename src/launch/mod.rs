//! Turns a launch intent into a systemd-nspawn invocation and runs it.

mod intent;
mod nspawn;

pub use intent::*;
pub use nspawn::*;
