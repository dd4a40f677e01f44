use crate::actions::list::get_sandboxes;
use crate::config::Config;
use crate::host::HostCapabilities;
use crate::sandbox::Sandbox;
use crate::snapshot;
use crate::util::{Lock, get_mounts};
use crate::{outln, util::set_json_output};
use anyhow::{Result, anyhow};
use colored::Colorize;
use log::{trace, warn};
use serde_json::Value;
use std::io::{self, Write};

pub fn delete(
    config: &Config,
    host: &HostCapabilities,
    patterns: &[String],
    force: bool,
) -> Result<()> {
    trace!("Preparing to delete sandboxes");
    let storage_dir = &config.storage_dir;

    let names = get_sandboxes(storage_dir, patterns)?;
    if names.is_empty() {
        outln!("No sandboxes found matching the specified patterns.");
        set_json_output("deleted", Value::Array(vec![]));
        return Ok(());
    }

    // Show sandboxes that will be deleted and ask for confirmation
    if !force {
        outln!("The following sandboxes will be deleted:");
        for name in &names {
            let snapshots = snapshot::list(&storage_dir.join(name))?.len();
            outln!("  {} ({} snapshots)", name.red(), snapshots);
        }

        // Use eprint! for the prompt since print! is not allowed
        eprint!("\nAre you sure you want to delete these sandboxes? [y/N] ");
        let _ = io::stderr().flush();

        let mut response = String::new();
        io::stdin().read_line(&mut response)?;

        if !response.trim().eq_ignore_ascii_case("y") {
            outln!("Delete operation cancelled.");
            return Ok(());
        }
    }

    let mut deleted_sandboxes = Vec::new();
    let mut errors = Vec::new();

    for name in names {
        trace!("Deleting sandbox: {}", name);
        match delete_one(config, host, &name) {
            Ok(()) => {
                outln!("Deleted sandbox: {}", name.green());
                deleted_sandboxes.push(Value::String(name));
            }
            Err(e) => {
                outln!("Error deleting sandbox {}: {:#}", name, e);
                errors.push(Value::String(format!("{}: {:#}", name, e)));
            }
        }
    }

    outln!("{} sandboxes deleted", deleted_sandboxes.len());

    let failed = errors.len();
    set_json_output("deleted", Value::Array(deleted_sandboxes));
    set_json_output("errors", Value::Array(errors));

    if failed > 0 {
        return Err(anyhow!("Failed to delete {} sandboxes", failed));
    }
    Ok(())
}

/// Deletes one sandbox under its lock. Leftover mounts from an interrupted
/// session are unmounted first.
fn delete_one(config: &Config, host: &HostCapabilities, name: &str) -> Result<()> {
    let _lock = Lock::sandbox(&config.storage_dir, name)?;
    let mut sandbox = Sandbox::from_location(&config.storage_dir, name, false, &config.image);

    if get_mounts(&sandbox.base)?.is_empty() {
        sandbox.remove()?;
    } else {
        warn!("Sandbox {} is still mounted, unmounting it first", name);
        let report = sandbox.cleanup(host, config.timeout)?;
        if let Some(e) = report.unmount_failure {
            warn!("Unmounting sandbox {} reported: {}", name, e);
        }
    }

    Ok(())
}
