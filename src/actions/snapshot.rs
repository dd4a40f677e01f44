use crate::config::{Config, cli::SnapshotAction};
use crate::host::HostCapabilities;
use crate::sandbox::Sandbox;
use crate::snapshot;
use crate::util::{Lock, check_name, is_mount_point};
use crate::{outln, util::set_json_output};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Local};
use colored::Colorize;
use serde_json::json;

pub fn snapshot(
    config: &Config,
    host: &HostCapabilities,
    name: &str,
    action: &SnapshotAction,
) -> Result<()> {
    check_name(name)?;
    let sandbox = Sandbox::from_location(&config.storage_dir, name, true, &config.image);
    if !sandbox.exists() {
        return Err(anyhow!("No sandbox named '{}' found", name));
    }
    let _lock = Lock::sandbox(&config.storage_dir, name)?;

    match action {
        SnapshotAction::Save { id } => {
            let path = snapshot::save(host, &sandbox.base, id, config.timeout)?;
            outln!("Snapshot '{}' saved for sandbox '{}'", id.green(), name);
            set_json_output("snapshot", id.as_str());
            set_json_output("path", path.to_string_lossy().to_string());
        }
        SnapshotAction::Restore { id } => {
            if is_mount_point(&sandbox.overlay_dir)? {
                return Err(anyhow!(
                    "Sandbox '{}' is mounted, snapshots can only be restored while it is not in use",
                    name
                ));
            }
            snapshot::restore(host, &sandbox.base, id, config.timeout)?;
            outln!("Snapshot '{}' restored for sandbox '{}'", id.green(), name);
            set_json_output("snapshot", id.as_str());
        }
        SnapshotAction::List => list(&sandbox)?,
    }

    Ok(())
}

fn list(sandbox: &Sandbox) -> Result<()> {
    let snapshots = snapshot::list(&sandbox.base)?;
    if snapshots.is_empty() {
        outln!("{}", format!("No snapshots of '{}'", sandbox.name).dimmed());
    }

    let mut listed = Vec::new();
    for info in snapshots {
        let modified: DateTime<Local> = info.modified.into();
        let modified = modified.format("%Y-%m-%d %H:%M:%S").to_string();
        outln!("{:<24} {:>12} bytes  {}", info.id, info.size, modified.dimmed());
        listed.push(json!({
            "id": info.id,
            "path": info.path.to_string_lossy(),
            "size": info.size,
            "modified": modified,
        }));
    }

    set_json_output("snapshots", listed);
    Ok(())
}
