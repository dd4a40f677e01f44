use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

use crate::sandbox::SandboxState;

/// Failure of a single external process invocation.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting on `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` timed out after {}s and was killed", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("`{program}` exited with {}{}", describe_status(*status), stderr_suffix(stderr))]
    Exited {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

impl CommandError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Exited { status, .. } => status.code(),
            _ => None,
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("status {}", code),
        None => format!("{}", status),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("missing host dependencies: {}", tools.join(", "))]
    DependencyMissing { tools: Vec<String> },

    #[error("failed to download {url}: {reason}")]
    DownloadFailure { url: String, reason: String },

    #[error("archive {} failed its integrity check: {reason}", path.display())]
    VerificationFailure { path: PathBuf, reason: String },

    #[error("failed to extract {} into {}: {reason}", archive.display(), dest.display())]
    ExtractionFailure {
        archive: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    #[error("failed to fix ownership/permissions of {}: {reason}", path.display())]
    PermissionFixFailure { path: PathBuf, reason: String },

    #[error("failed to mount overlay at {}", target.display())]
    MountFailure {
        target: PathBuf,
        #[source]
        source: CommandError,
    },

    #[error("failed to unmount {}", target.display())]
    UnmountFailure {
        target: PathBuf,
        #[source]
        source: CommandError,
    },

    #[error("failed to bind mount {} to {}: {reason}", source_path.display(), target.display())]
    BindMountFailure {
        source_path: PathBuf,
        target: PathBuf,
        reason: String,
    },

    #[error("failed to install package '{package}'")]
    PackageInstallFailure {
        package: String,
        #[source]
        source: CommandError,
    },

    /// `status` is the container's exit code when it ran and exited normally.
    #[error("container for sandbox '{name}' failed")]
    LaunchFailure {
        name: String,
        status: Option<i32>,
        #[source]
        source: CommandError,
    },

    #[error("failed to save snapshot '{snapshot}': {reason}")]
    SnapshotSaveFailure { snapshot: String, reason: String },

    #[error("failed to restore snapshot '{snapshot}': {reason}")]
    SnapshotRestoreFailure { snapshot: String, reason: String },

    #[error("failed to delete {}", path.display())]
    CleanupDeleteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unusable path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("failed to lock {}: {reason}", path.display())]
    Lock { path: PathBuf, reason: String },
}

impl SandboxError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SandboxError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Returned by `Sandbox::setup`; records how far setup got before failing so the
/// caller can decide whether to run cleanup.
#[derive(Error, Debug)]
#[error("setup of sandbox '{name}' failed after reaching {reached}: {source}")]
pub struct SetupError {
    pub name: String,
    pub reached: SandboxState,
    #[source]
    pub source: SandboxError,
}

pub type Result<T, E = SandboxError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_exited_message_includes_stderr() {
        let err = CommandError::Exited {
            program: "mount".to_string(),
            status: ExitStatus::from_raw(32 << 8),
            stderr: "mount: /x: permission denied.\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`mount` exited with status 32: mount: /x: permission denied."
        );
        assert_eq!(err.exit_code(), Some(32));
    }

    #[test]
    fn test_dependency_missing_lists_every_tool() {
        let err = SandboxError::DependencyMissing {
            tools: vec!["systemd-nspawn".to_string(), "zstd".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "missing host dependencies: systemd-nspawn, zstd"
        );
    }

    #[test]
    fn test_setup_error_reports_state() {
        let err = SetupError {
            name: "dev".to_string(),
            reached: SandboxState::DirectoriesReady,
            source: SandboxError::DependencyMissing {
                tools: vec!["mount".to_string()],
            },
        };
        assert!(err.to_string().contains("'dev'"));
        assert!(err.to_string().contains("directories-ready"));
    }

    #[test]
    fn test_launch_failure_keeps_cause() {
        let err = SandboxError::LaunchFailure {
            name: "dev".to_string(),
            status: None,
            source: CommandError::Spawn {
                program: "systemd-nspawn".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
        };
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert!(cause.starts_with("failed to spawn `systemd-nspawn`"));
        assert!(!err.to_string().contains("signal"));
    }
}
