use anyhow::{Context, Result};
use colored::*;
use fast_glob::glob_match;
use log::trace;
use serde_json::{Value, json};
use std::path::Path;

use crate::sandbox::is_sandbox_dir;
use crate::snapshot;
use crate::util::is_mount_point;
use crate::{outln, util::set_json_output};

/// Names of sandboxes in the storage dir matching any of `patterns`, sorted.
/// A pattern matches anywhere in the name; no patterns matches everything.
pub fn get_sandboxes(
    sandboxes_storage_dir: &Path,
    patterns: &[String],
) -> Result<Vec<String>> {
    let entries = match sandboxes_storage_dir.read_dir() {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(vec![]);
        }
        Err(e) => {
            return Err(e).context(format!(
                "Failed to read storage directory {}",
                sandboxes_storage_dir.display()
            ));
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') || !is_sandbox_dir(&entry.path()) {
            continue;
        }

        if patterns.is_empty()
            || patterns
                .iter()
                .any(|pattern| glob_match(&format!("*{pattern}*"), &name))
        {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

pub fn list(sandboxes_storage_dir: &Path, patterns: &[String]) -> Result<()> {
    trace!("Listing sandboxes");

    let mut listed = Vec::new();
    for name in get_sandboxes(sandboxes_storage_dir, patterns)? {
        let base = sandboxes_storage_dir.join(&name);
        let mounted = is_mount_point(&base.join("overlay"))?;
        let snapshots = snapshot::list(&base)?.len();

        let state = if mounted {
            "mounted".green()
        } else {
            "stopped".dimmed()
        };
        outln!("{:<24} {} ({} snapshots)", name, state, snapshots);

        listed.push(json!({
            "name": name,
            "mounted": mounted,
            "snapshots": snapshots,
        }));
    }

    if listed.is_empty() {
        outln!("{}", "No sandboxes found".dimmed());
    }

    set_json_output("sandboxes", Value::Array(listed));
    Ok(())
}
