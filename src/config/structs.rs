use super::impls::{deserialize_level_filter, deserialize_timeout};
use serde::Deserialize;
use std::{collections::HashMap, path::PathBuf, time::Duration};

pub const DEFAULT_IMAGE: &str = "https://archive.archlinux.org/iso/2024.07.01/archlinux-bootstrap-2024.07.01-x86_64.tar.zst";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);

/// Tool settings as read from one config file or the environment; unset fields
/// fall through to the next layer.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(deserialize_with = "deserialize_level_filter", default)]
    pub log_level: Option<log::LevelFilter>,
    pub storage_dir: Option<String>,
    pub cache_dir: Option<String>,
    pub image: Option<String>,
    /// Seconds, 0 disables the limit.
    #[serde(deserialize_with = "deserialize_timeout", default)]
    pub timeout: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: log::LevelFilter,
    pub storage_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub image: String,
    /// Bound on every external tool except the interactive container session.
    pub timeout: Option<Duration>,
    pub sources: HashMap<String, String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// A sandbox definition, loaded from the file given to `new --config`.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SandboxConfig {
    pub name: Option<String>,
    #[serde(default)]
    pub persist: bool,
    #[serde(alias = "tarball")]
    pub image: Option<String>,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub mounts: Vec<BindMount>,
    pub network: Option<String>,
}
