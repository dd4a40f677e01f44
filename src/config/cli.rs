use super::resolve_config;
use crate::sandbox::is_sandbox_dir;
use clap::Parser;
use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /********************/
    /* Flags and settings */
    /********************/
    /// Set the log level to one of trace, debug, info, warn, or error.
    /// `-v` is shorthand for enabling verbose (trace) logging.
    #[arg(short = 'v',
        long,
        global = true,
        default_missing_value = "trace",
        num_args = 0..=1,
        require_equals = true,
        value_parser = parse_log_level
    )]
    pub log_level: Option<log::LevelFilter>,

    /// Base storage directory for all sandboxes. Defaults to `~/.arch-sandbox/`
    #[arg(long, global = true)]
    pub storage_dir: Option<String>,

    /// Where downloaded base images are cached. Defaults to `<storage-dir>/.cache/`
    #[arg(long, global = true)]
    pub cache_dir: Option<String>,

    /// Seconds any download, extraction, mount or install may take, 0 for no limit.
    /// The interactive session itself is never limited.
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Formats action output as a JSON blob.
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub json: bool,

    /// Do not load config files.
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub no_config: bool,

    /***************/
    /* Subcommands */
    /***************/
    #[command(subcommand)]
    pub action: Action,
}

#[derive(clap::Subcommand, Clone, Debug)]
#[command(subcommand_help_heading = "Actions")]
pub enum Action {
    /// Create a sandbox and open a shell in it. The sandbox is removed when the
    /// shell exits unless --persist is given. Requires root.
    New {
        /// Name of the sandbox, also used as the container's machine name
        #[arg(value_name = "NAME", add = ArgValueCompleter::new(sandbox_name_completion))]
        name: Option<String>,

        /// Keep the sandbox after the shell exits
        #[arg(short = 'p', long)]
        persist: bool,

        /// Network mode: host, private or none
        #[arg(long, value_name = "MODE")]
        network: Option<String>,

        /// DNS servers to use inside the sandbox (ignored with host networking)
        #[arg(long, value_name = "SERVERS", value_delimiter = ',')]
        dns: Vec<String>,

        /// Forward ports as host:container. Can be given multiple times.
        #[arg(
            long = "port",
            value_name = "PORTS",
            value_delimiter = ',',
            action = clap::ArgAction::Append
        )]
        ports: Vec<String>,

        /// Relative CPU weight for the container
        #[arg(long, value_name = "WEIGHT")]
        cpu_shares: Option<String>,

        /// Memory ceiling for the container, e.g. 2G
        #[arg(long, value_name = "LIMIT")]
        memory_limit: Option<String>,

        /// Sandbox definition file with packages, mounts and network settings
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// URL of the base image archive
        #[arg(long, value_name = "URL")]
        image: Option<String>,
    },

    /// Save, restore or list snapshots of a sandbox's changes
    Snapshot {
        /// Name of the sandbox
        #[arg(value_name = "NAME", add = ArgValueCompleter::new(sandbox_name_completion))]
        name: String,

        #[command(subcommand)]
        action: SnapshotAction,
    },

    /// List sandboxes matching these patterns (defaults to all)
    List {
        /// Patterns of sandboxes to list
        #[arg(value_name = "PATTERNS", num_args = 0..)]
        patterns: Option<Vec<String>>,
    },

    /// Delete sandboxes and all associated files
    Delete {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        /// Patterns of sandboxes to delete
        #[arg(value_name = "PATTERNS", num_args = 1.., required = true, add = ArgValueCompleter::new(sandbox_name_completion))]
        patterns: Vec<String>,
    },

    /// Get current configuration options
    Config {
        /// The keys to get from the configuration
        #[arg(value_name = "KEYS", num_args = 0..)]
        keys: Option<Vec<String>>,
    },
}

#[derive(clap::Subcommand, Clone, Debug)]
pub enum SnapshotAction {
    /// Archive the sandbox's changes under an id, replacing any earlier one
    Save {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Replace the sandbox's changes with a saved snapshot
    Restore {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// List saved snapshots
    List,
}

pub fn sandbox_name_completion(
    current: &std::ffi::OsStr,
) -> Vec<CompletionCandidate> {
    let mut completions = vec![];
    let Some(current) = current.to_str() else {
        return completions;
    };

    let Ok(cli) = Args::try_parse() else {
        return completions;
    };
    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(_) => return completions,
    };

    let entries = match std::fs::read_dir(&config.storage_dir) {
        Ok(entries) => entries,
        Err(_) => return completions,
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };

        if file_name.starts_with(current) && is_sandbox_dir(&entry.path()) {
            completions.push(CompletionCandidate::new(file_name));
        }
    }

    completions
}

fn parse_log_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse::<log::LevelFilter>().map_err(|e| e.to_string())
}
