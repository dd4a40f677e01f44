#![allow(clippy::option_map_unit_fn)]
use crate::config::Config;
use crate::outln;
use crate::util::set_json_output;
use anyhow::Result;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

const KEYS: [&str; 5] = ["log_level", "storage_dir", "cache_dir", "image", "timeout"];

pub fn config(config: &Config, keys: Option<Vec<String>>) -> Result<()> {
    let keys = keys.unwrap_or_else(|| KEYS.map(String::from).to_vec());
    let multi_line = keys.len() > 1;

    for key in keys {
        let (key, value) = config_value(config, &key)?;
        print_config_line(key, &value, multi_line, &config.sources);
    }

    Ok(())
}

/// Keys are accepted with either underscores or dashes.
fn config_value(config: &Config, key: &str) -> Result<(&'static str, String)> {
    Ok(match key {
        "log_level" | "log-level" => ("log_level", config.log_level.to_string()),
        "storage_dir" | "storage-dir" => (
            "storage_dir",
            config.storage_dir.to_string_lossy().to_string(),
        ),
        "cache_dir" | "cache-dir" => {
            ("cache_dir", config.cache_dir.to_string_lossy().to_string())
        }
        "image" => ("image", config.image.clone()),
        "timeout" => (
            "timeout",
            config
                .timeout
                .map_or("0".to_string(), |t| t.as_secs().to_string()),
        ),
        _ => {
            return Err(anyhow::anyhow!("Unknown key: {}", key));
        }
    })
}

fn print_config_line(
    key: &str,
    value: &str,
    multi_line: bool,
    sources: &HashMap<String, String>,
) {
    sources.get(key).map(|s| {
        debug!("{}={} set from {}", key, value, s);
    });
    set_json_output(key, Value::String(value.to_string()));

    if multi_line {
        outln!("{}={}", key, value);
    } else {
        outln!("{}", value);
    }
}
