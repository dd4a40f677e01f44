use crate::config::{Config, SandboxConfig};
use crate::host::HostCapabilities;
use crate::launch::{LaunchIntent, NetworkMode};
use crate::sandbox::{CleanupOutcome, Sandbox, SandboxState};
use crate::types::UidGidHome;
use crate::util::{Lock, check_name, mkdir, set_json_output};
use crate::{outln, overlay};
use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use log::{error, info, warn};
use std::path::PathBuf;

/// Everything `new` takes from the command line.
#[derive(Debug, Clone, Default)]
pub struct NewOptions {
    pub name: Option<String>,
    pub persist: bool,
    pub network: Option<String>,
    pub dns: Vec<String>,
    pub ports: Vec<String>,
    pub cpu_shares: Option<String>,
    pub memory_limit: Option<String>,
    pub config: Option<PathBuf>,
    pub image: Option<String>,
}

/// The sandbox definition after command line flags have been applied on top of
/// the `--config` file.
#[derive(Debug, PartialEq, Eq)]
struct Plan {
    name: String,
    persist: bool,
    image: String,
    sandbox_config: SandboxConfig,
    intent: LaunchIntent,
}

fn plan(
    config: &Config,
    uid_gid_home: &UidGidHome,
    options: NewOptions,
) -> Result<Plan> {
    let mut sandbox_config = match &options.config {
        Some(path) => SandboxConfig::load(path)?,
        None => SandboxConfig::default(),
    };
    sandbox_config.expand_mount_sources(&uid_gid_home.home);

    let name = options
        .name
        .or_else(|| sandbox_config.name.clone())
        .ok_or_else(|| {
            anyhow!("A sandbox name is required, either as an argument or in the --config file")
        })?;
    check_name(&name)?;

    let image = options
        .image
        .or_else(|| sandbox_config.image.clone())
        .unwrap_or_else(|| config.image.clone());

    let network = options.network.or_else(|| sandbox_config.network.clone());
    let intent = LaunchIntent {
        network_mode: network
            .as_deref()
            .map(NetworkMode::parse)
            .unwrap_or_default(),
        dns: options.dns,
        ports: options.ports,
        cpu_shares: options.cpu_shares,
        memory_limit: options.memory_limit,
    };

    Ok(Plan {
        name,
        persist: options.persist || sandbox_config.persist,
        image,
        sandbox_config,
        intent,
    })
}

/**
 * Sets up a sandbox, runs an interactive shell in it and cleans up after the
 * shell exits. The whole cycle runs under the sandbox's lock.
 */
pub fn new(
    config: &Config,
    host: &HostCapabilities,
    uid_gid_home: &UidGidHome,
    options: NewOptions,
) -> Result<()> {
    let plan = plan(config, uid_gid_home, options)?;

    mkdir(&config.storage_dir, uid_gid_home.uid, uid_gid_home.gid)
        .context("Creating storage directory")?;
    let _lock = Lock::sandbox(&config.storage_dir, &plan.name)?;

    let mut sandbox = Sandbox::from_location(
        &config.storage_dir,
        &plan.name,
        plan.persist,
        &plan.image,
    );
    set_json_output("name", plan.name.as_str());

    if let Err(e) = sandbox.setup(host, config, &plan.sandbox_config) {
        error!("{}", e);
        // Keep the tree for inspection but don't leave the overlay mounted
        if e.reached >= SandboxState::Mounted {
            if let Err(unmount_error) =
                overlay::unmount(host, &sandbox.overlay_dir, config.timeout)
            {
                warn!("{}", unmount_error);
            }
        }
        outln!(
            "Sandbox files were left in {} for inspection",
            sandbox.base.display()
        );
        return Err(e.into());
    }

    outln!("Entering sandbox {}", plan.name.green());
    let session = sandbox.launch(host, &plan.intent);
    if let Err(e) = &session {
        warn!("{}", e);
    }

    let report = sandbox
        .cleanup(host, config.timeout)
        .context(format!("Cleaning up sandbox '{}'", plan.name))?;
    if let Some(e) = &report.unmount_failure {
        error!("{}", e);
    }

    match report.outcome {
        CleanupOutcome::Persisted => {
            outln!("Sandbox {} kept in {}", plan.name, sandbox.base.display());
            set_json_output("persisted", true);
        }
        CleanupOutcome::Destroyed => {
            info!("Removed sandbox {}", plan.name);
            set_json_output("persisted", false);
        }
    }

    match report.unmount_failure {
        Some(e) => Err(e.into()),
        None => session.map_err(Into::into),
    }
}
