use log::warn;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Share the host's network stack.
    #[default]
    Host,
    /// Own network namespace with a veth link to the host.
    Private,
    /// Own network namespace with nothing but loopback.
    None,
}

impl NetworkMode {
    /// Unknown modes are not fatal: warn and fall back to host networking.
    pub fn parse(mode: &str) -> NetworkMode {
        match mode.trim().to_lowercase().as_str() {
            "" | "host" => NetworkMode::Host,
            "private" => NetworkMode::Private,
            "none" => NetworkMode::None,
            other => {
                warn!(
                    "Unknown network mode '{}', falling back to host networking",
                    other
                );
                NetworkMode::Host
            }
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkMode::Host => write!(f, "host"),
            NetworkMode::Private => write!(f, "private"),
            NetworkMode::None => write!(f, "none"),
        }
    }
}

/// How the container should be started. Built per launch, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchIntent {
    pub network_mode: NetworkMode,
    pub dns: Vec<String>,
    pub ports: Vec<String>,
    pub cpu_shares: Option<String>,
    pub memory_limit: Option<String>,
}
