mod capabilities;
mod command;

pub use capabilities::*;
pub use command::*;
