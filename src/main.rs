#![allow(
    clippy::collapsible_else_if,
    clippy::collapsible_if,
    clippy::module_inception,
    clippy::result_map_unit_fn,
    clippy::useless_format
)]
#![deny(
    clippy::get_unwrap,
    clippy::panic,
    clippy::print_stdout,
    clippy::unwrap_used,
    clippy::use_debug,
    clippy::used_underscore_binding,
    clippy::used_underscore_items
)]

mod actions;
mod config;
mod error;
mod host;
mod image;
mod launch;
mod logger;
mod overlay;
mod sandbox;
mod snapshot;
mod types;
mod util;

use anyhow::{Context, Result, anyhow};
use clap::CommandFactory;
use clap::Parser;
use clap_complete::CompleteEnv;
use config::{cli, resolve_config};
use host::HostCapabilities;
use log::{Log, debug};
use nix::unistd::geteuid;
use util::{
    print_json_output, resolve_uid_gid_home, set_json_output, set_plain_output,
};

pub fn main() -> Result<()> {
    // This function will not return if tab completion was requested
    CompleteEnv::with_factory(cli::Args::command).complete();

    let logger = logger::ArchSandboxLogger::new(log::LevelFilter::Trace)
        .init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;
    let cli: cli::Args = cli::Args::parse();
    set_plain_output(!cli.json);

    let result = run(&cli, logger);

    // Anything still deferred was logged before config resolution failed
    logger.print_deferred();

    if cli.json {
        match &result {
            Ok(()) => set_json_output("status", "success"),
            Err(e) => {
                set_json_output("status", "error");
                set_json_output("error", format!("{:#}", e));
            }
        }
        print_json_output()?;
        logger.flush();
        if result.is_err() {
            std::process::exit(1);
        }
    }

    logger.flush();
    result
}

fn run(cli: &cli::Args, logger: &logger::ArchSandboxLogger) -> Result<()> {
    logger.set_level(cli.log_level.unwrap_or(log::LevelFilter::Info));
    let config = resolve_config(cli).context("Resolving config")?;
    let uid_gid_home =
        resolve_uid_gid_home().context("Resolving uid/gid/home")?;

    // Now that we've loaded the config, we can set the log level and print out
    // any deferred messages emitted while we were loading the config.
    logger.set_level(config.log_level);
    logger.print_deferred();

    let host = HostCapabilities::probe();
    debug!("Using storage directory {}", config.storage_dir.display());

    match cli.action.clone() {
        cli::Action::New {
            name,
            persist,
            network,
            dns,
            ports,
            cpu_shares,
            memory_limit,
            config: sandbox_config,
            image,
        } => {
            if !geteuid().is_root() {
                return Err(anyhow!(
                    "Insufficient permissions to create the sandbox, please retry using `sudo`"
                ));
            }
            actions::new(
                &config,
                &host,
                &uid_gid_home,
                actions::NewOptions {
                    name,
                    persist,
                    network,
                    dns,
                    ports,
                    cpu_shares,
                    memory_limit,
                    config: sandbox_config,
                    image,
                },
            )
        }
        cli::Action::Snapshot { name, action } => {
            actions::snapshot(&config, &host, &name, &action)
        }
        cli::Action::List { patterns } => {
            actions::list(&config.storage_dir, &patterns.unwrap_or_default())
        }
        cli::Action::Delete { yes, patterns } => {
            actions::delete(&config, &host, &patterns, yes)
        }
        cli::Action::Config { keys } => actions::config(&config, keys),
    }
}
