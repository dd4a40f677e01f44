mod uid_gid_home;

pub use uid_gid_home::*;
