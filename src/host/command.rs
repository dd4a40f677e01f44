use crate::error::CommandError;
use log::{debug, warn};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().to_string()
}

/**
 * Runs a command to completion with stdout discarded and stderr captured, so a
 * failure can be reported with the tool's own message.
 */
pub fn run_captured(
    cmd: &mut Command,
    timeout: Option<Duration>,
) -> Result<(), CommandError> {
    debug!("Executing: {}", describe(cmd));
    let program = program_name(cmd);

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;

    // Drain stderr on its own thread so a chatty tool can't block on a full pipe
    // while we poll for its exit.
    let stderr_reader = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let status = wait(&mut child, &program, timeout);
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    check_status(program, status?, stderr)
}

/**
 * Runs a command with the caller's stdin/stdout/stderr attached. Used for the
 * container session and package installs, whose output belongs to the user.
 */
pub fn run_interactive(
    cmd: &mut Command,
    timeout: Option<Duration>,
) -> Result<(), CommandError> {
    debug!("Executing: {}", describe(cmd));
    let program = program_name(cmd);

    let mut child = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;

    let status = wait(&mut child, &program, timeout)?;
    check_status(program, status, String::new())
}

fn check_status(
    program: String,
    status: ExitStatus,
    stderr: String,
) -> Result<(), CommandError> {
    if status.success() {
        Ok(())
    } else {
        Err(CommandError::Exited {
            program,
            status,
            stderr,
        })
    }
}

fn wait(
    child: &mut Child,
    program: &str,
    timeout: Option<Duration>,
) -> Result<ExitStatus, CommandError> {
    let Some(timeout) = timeout else {
        return child.wait().map_err(|source| CommandError::Wait {
            program: program.to_string(),
            source,
        });
    };

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if start.elapsed() > timeout {
                    warn!(
                        "{} still running after {}s, killing it",
                        program,
                        timeout.as_secs()
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CommandError::TimedOut {
                        program: program.to_string(),
                        timeout,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                return Err(CommandError::Wait {
                    program: program.to_string(),
                    source,
                });
            }
        }
    }
}
