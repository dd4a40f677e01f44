mod config;
mod delete;
mod list;
mod new;
mod snapshot;

pub use config::*;
pub use delete::*;
pub use list::*;
pub use new::*;
pub use snapshot::*;
