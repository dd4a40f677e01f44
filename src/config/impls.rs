use super::structs::{BindMount, SandboxConfig};
use crate::util::expand_tilde_path;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fmt::{self, Display},
    path::Path,
    str::FromStr,
};

impl Display for BindMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.display(), self.target.display())
    }
}

impl FromStr for SandboxConfig {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl SandboxConfig {
    pub fn load(path: &Path) -> Result<SandboxConfig> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read sandbox config {}", path.display()))?;
        contents
            .parse()
            .context(format!("Failed to parse sandbox config {}", path.display()))
    }

    /// Bind sources may be written relative to the invoking user's home.
    pub fn expand_mount_sources(&mut self, home: &Path) {
        for mount in self.mounts.iter_mut() {
            mount.source = expand_tilde_path(&mount.source, home);
        }
    }
}

pub(crate) fn deserialize_level_filter<'de, D>(
    deserializer: D,
) -> Result<Option<log::LevelFilter>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map_or(Ok(None), |s| {
        log::LevelFilter::from_str(&s)
            .map(Some)
            .map_err(serde::de::Error::custom)
    })
}

pub(crate) fn deserialize_timeout<'de, D>(
    deserializer: D,
) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let seconds: Option<i64> = Option::deserialize(deserializer)?;
    seconds.map_or(Ok(None), |s| {
        u64::try_from(s).map(Some).map_err(|_| {
            serde::de::Error::custom(format!(
                "timeout must not be negative, got {}",
                s
            ))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartialConfig;
    use std::path::PathBuf;

    #[test]
    fn test_parse_sandbox_config() {
        let config: SandboxConfig = r#"
            name = "dev"
            persist = true
            tarball = "https://example.com/arch.tar.zst"
            packages = ["git", "base-devel"]
            network = "private"

            [[mounts]]
            source = "~/src"
            target = "/src"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.name.as_deref(), Some("dev"));
        assert!(config.persist);
        assert_eq!(
            config.image.as_deref(),
            Some("https://example.com/arch.tar.zst")
        );
        assert_eq!(config.packages, vec!["git", "base-devel"]);
        assert_eq!(config.network.as_deref(), Some("private"));
        assert_eq!(config.mounts.len(), 1);
        assert_eq!(config.mounts[0].to_string(), "~/src:/src");
    }

    #[test]
    fn test_sandbox_config_defaults() {
        let config: SandboxConfig = "".parse().unwrap();
        assert_eq!(config, SandboxConfig::default());
    }

    #[test]
    fn test_sandbox_config_rejects_unknown_fields() {
        assert!("pakages = []".parse::<SandboxConfig>().is_err());
    }

    #[test]
    fn test_expand_mount_sources() {
        let mut config: SandboxConfig = r#"
            [[mounts]]
            source = "~/src"
            target = "/src"

            [[mounts]]
            source = "/etc/hosts"
            target = "/etc/hosts"
        "#
        .parse()
        .unwrap();
        config.expand_mount_sources(Path::new("/home/test"));
        assert_eq!(config.mounts[0].source, PathBuf::from("/home/test/src"));
        assert_eq!(config.mounts[1].source, PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_load_sandbox_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.toml");
        std::fs::write(&path, "packages = [\"vim\"]\n").unwrap();
        assert_eq!(SandboxConfig::load(&path).unwrap().packages, vec!["vim"]);
        assert!(SandboxConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_partial_config_fields() {
        let partial: PartialConfig =
            toml::from_str("log_level = \"debug\"\ntimeout = 0\n").unwrap();
        assert_eq!(partial.log_level, Some(log::LevelFilter::Debug));
        assert_eq!(partial.timeout, Some(0));

        assert!(toml::from_str::<PartialConfig>("timeout = -5").is_err());
        assert!(toml::from_str::<PartialConfig>("log_level = \"loud\"").is_err());
    }
}
