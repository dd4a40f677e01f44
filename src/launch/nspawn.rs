use super::{LaunchIntent, NetworkMode};
use crate::error::{Result, SandboxError};
use crate::host::{HostCapabilities, Tool, describe, run_interactive};
use log::{error, info};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

pub const SHELL: &str = "/bin/bash";

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/**
 * Builds the systemd-nspawn argument list for a launch. Pure, so the mapping from
 * intent to flags can be checked without starting anything.
 */
pub fn nspawn_args(
    merged: &Path,
    name: &str,
    intent: &LaunchIntent,
) -> Vec<OsString> {
    let mut directory = OsString::from("--directory=");
    directory.push(merged);

    let mut args = vec![directory, OsString::from(format!("--machine={}", name))];

    match intent.network_mode {
        NetworkMode::Host => {}
        NetworkMode::Private => args.push("--network-veth".into()),
        NetworkMode::None => args.push("--private-network".into()),
    }

    if intent.network_mode != NetworkMode::Host && !intent.dns.is_empty() {
        args.push("--resolv-conf=off".into());
        args.extend(intent.dns.iter().map(|d| format!("--dns={}", d).into()));
    }

    args.extend(intent.ports.iter().map(|p| format!("--port={}", p).into()));

    if let Some(cpu) = non_empty(&intent.cpu_shares) {
        args.push(format!("--property=CPUWeight={}", cpu).into());
    }
    if let Some(memory) = non_empty(&intent.memory_limit) {
        args.push(format!("--property=MemoryMax={}", memory).into());
    }

    args.push(SHELL.into());
    args
}

/**
 * Starts an interactive container on the merged view and blocks until the user's
 * session ends. No timeout: the session lasts as long as the user wants.
 */
pub fn launch(
    host: &HostCapabilities,
    merged: &Path,
    name: &str,
    intent: &LaunchIntent,
) -> Result<()> {
    let mut cmd = Command::new(host.path(Tool::Nspawn)?);
    cmd.args(nspawn_args(merged, name, intent));
    info!("Launching sandbox {}: {}", name, describe(&cmd));

    run_interactive(&mut cmd, None).map_err(|e| {
        error!("Container for sandbox {} failed: {}", name, e);
        SandboxError::LaunchFailure {
            name: name.to_string(),
            status: e.exit_code(),
            source: e,
        }
    })
}
