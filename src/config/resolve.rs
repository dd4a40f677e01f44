use super::PartialConfig;
use super::cli::Args;
use super::{Config, DEFAULT_IMAGE, DEFAULT_TIMEOUT};
use crate::types::UidGidHome;
use crate::util::{expand_tilde_path, resolve_uid_gid_home};
use anyhow::{Context, Result, anyhow};
use log::trace;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "ARCH_SANDBOX_";

pub fn resolve_config(cli: &Args) -> Result<Config> {
    let uid_gid_home = resolve_uid_gid_home()?;
    let (partial_config, sources) = load_partial(cli.no_config, &uid_gid_home)?;
    resolve_layers(cli, &uid_gid_home, partial_config, sources, |key| {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    })
}

/**
 * Applies the environment and the command line on top of what the config files
 * produced, then fills in defaults. `sources` records where each value came from.
 */
fn resolve_layers(
    cli: &Args,
    uid_gid_home: &UidGidHome,
    mut partial_config: PartialConfig,
    mut sources: HashMap<String, String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let env_var = |key: &str| env(&format!("{}{}", ENV_PREFIX, key));

    // Override with environment variables if set
    if let Some(log_level) = env_var("LOG_LEVEL") {
        let log_level = log::LevelFilter::from_str(&log_level)
            .map_err(|_| anyhow!("Invalid log level: {}", log_level))?;
        partial_config.log_level = Some(log_level);
        sources.insert("log_level".into(), "environment".into());
    }
    if let Some(storage_dir) = env_var("STORAGE_DIR") {
        partial_config.storage_dir = Some(storage_dir);
        sources.insert("storage_dir".into(), "environment".into());
    }
    if let Some(cache_dir) = env_var("CACHE_DIR") {
        partial_config.cache_dir = Some(cache_dir);
        sources.insert("cache_dir".into(), "environment".into());
    }
    if let Some(image) = env_var("IMAGE") {
        partial_config.image = Some(image);
        sources.insert("image".into(), "environment".into());
    }
    if let Some(timeout) = env_var("TIMEOUT") {
        let timeout = timeout.parse::<u64>().map_err(|_| {
            anyhow!("Invalid value for {}TIMEOUT: {}", ENV_PREFIX, timeout)
        })?;
        partial_config.timeout = Some(timeout);
        sources.insert("timeout".into(), "environment".into());
    }

    // Override with CLI args if provided (highest precedence)
    if let Some(log_level) = cli.log_level {
        partial_config.log_level = Some(log_level);
        sources.insert("log_level".into(), "cli".into());
    }
    if let Some(storage_dir) = &cli.storage_dir {
        partial_config.storage_dir = Some(storage_dir.clone());
        sources.insert("storage_dir".into(), "cli".into());
    }
    if let Some(cache_dir) = &cli.cache_dir {
        partial_config.cache_dir = Some(cache_dir.clone());
        sources.insert("cache_dir".into(), "cli".into());
    }
    if let Some(timeout) = cli.timeout {
        partial_config.timeout = Some(timeout);
        sources.insert("timeout".into(), "cli".into());
    }

    // If nothing else, fill in with some default values
    let storage_dir = match partial_config.storage_dir {
        Some(dir) => expand_tilde_path(Path::new(&dir), &uid_gid_home.home),
        None => {
            sources.insert("storage_dir".into(), "default".into());
            uid_gid_home.home.join(".arch-sandbox")
        }
    };

    let cache_dir = match partial_config.cache_dir {
        Some(dir) => expand_tilde_path(Path::new(&dir), &uid_gid_home.home),
        None => {
            sources.insert("cache_dir".into(), "derived from storage_dir".into());
            storage_dir.join(".cache")
        }
    };

    let image = partial_config.image.unwrap_or_else(|| {
        sources.insert("image".into(), "default".into());
        DEFAULT_IMAGE.to_string()
    });

    let timeout = match partial_config.timeout {
        Some(0) => None,
        Some(seconds) => Some(Duration::from_secs(seconds)),
        None => {
            sources.insert("timeout".into(), "default".into());
            Some(DEFAULT_TIMEOUT)
        }
    };

    let log_level = partial_config.log_level.unwrap_or_else(|| {
        sources.insert("log_level".into(), "default".into());
        log::LevelFilter::Info
    });

    let config = Config {
        log_level,
        storage_dir,
        cache_dir,
        image,
        timeout,
        sources,
    };

    validate_config(&config)?;

    trace!("Storage dir: {}", config.storage_dir.display());
    trace!("Cache dir: {}", config.cache_dir.display());

    Ok(config)
}

pub fn load_partial(
    no_config: bool,
    uid_gid_home: &UidGidHome,
) -> Result<(PartialConfig, HashMap<String, String>)> {
    let config_paths = if no_config {
        vec![]
    } else {
        let cwd = std::env::current_dir()?;
        find_config_files(&cwd, &uid_gid_home.home)
    };
    let mut sources = HashMap::new();
    if config_paths.is_empty() {
        trace!("No config files found, using default config");
        return Ok((PartialConfig::default(), sources));
    }

    let mut merged_config = PartialConfig::default();
    for path in config_paths.iter() {
        let config_str = std::fs::read_to_string(path).context(format!(
            "Failed to read config file {}",
            path.display()
        ))?;

        let config: PartialConfig = toml::from_str(&config_str).context(
            format!("Failed to parse config file {}", path.display()),
        )?;

        merge_configs(
            &mut merged_config,
            &mut sources,
            config,
            &path.to_string_lossy(),
        );
        trace!("Loaded config file: {}", path.display());
    }

    Ok((merged_config, sources))
}

/** Returns every existing config file, lowest precedence first */
fn find_config_files(cwd: &Path, home: &Path) -> Vec<PathBuf> {
    let mut paths_to_check = Vec::new();

    // Any project specific files, closest to cwd wins
    let mut current_dir = cwd.to_path_buf();
    loop {
        paths_to_check.push(current_dir.join(".arch-sandbox.toml"));
        if current_dir == home || !current_dir.pop() {
            break;
        }
    }

    paths_to_check.push(home.join(".config/arch-sandbox/config.toml"));
    paths_to_check.push(PathBuf::from("/etc/arch-sandbox.toml"));

    // Finally reverse them so we can process them in order nicely
    paths_to_check.reverse();

    paths_to_check
        .into_iter()
        .filter(|path| path.is_file())
        .collect()
}

fn merge_configs(
    base: &mut PartialConfig,
    sources: &mut HashMap<String, String>,
    override_config: PartialConfig,
    source: &str,
) {
    if let Some(log_level) = override_config.log_level {
        base.log_level = Some(log_level);
        sources.insert("log_level".into(), source.into());
    }
    if let Some(storage_dir) = override_config.storage_dir {
        base.storage_dir = Some(storage_dir);
        sources.insert("storage_dir".into(), source.into());
    }
    if let Some(cache_dir) = override_config.cache_dir {
        base.cache_dir = Some(cache_dir);
        sources.insert("cache_dir".into(), source.into());
    }
    if let Some(image) = override_config.image {
        base.image = Some(image);
        sources.insert("image".into(), source.into());
    }
    if let Some(timeout) = override_config.timeout {
        base.timeout = Some(timeout);
        sources.insert("timeout".into(), source.into());
    }
}

fn validate_config(config: &Config) -> Result<()> {
    if !config.storage_dir.is_absolute() {
        return Err(anyhow!(
            "Storage directory must be an absolute path: {}",
            config.storage_dir.display()
        ));
    }
    if !config.cache_dir.is_absolute() {
        return Err(anyhow!(
            "Cache directory must be an absolute path: {}",
            config.cache_dir.display()
        ));
    }
    if config.image.trim().is_empty() {
        return Err(anyhow!("Image URL must not be empty"));
    }

    Ok(())
}
