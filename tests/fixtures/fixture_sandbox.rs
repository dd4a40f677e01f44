use anyhow::Result;
use rand::Rng;
use rstest::*;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn rid() -> String {
    let mut rng = rand::rng();
    let rid: String = (0..10)
        .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
        .collect();
    rid
}

pub fn get_sandbox_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_arch-sandbox"))
}

#[allow(dead_code)]
pub fn have_tools(tools: &[&str]) -> bool {
    tools.iter().all(|tool| which::which(tool).is_ok())
}

/**
 * Runs the arch-sandbox binary against a private storage directory and home, so
 * tests never see each other's sandboxes or the user's config files.
 */
pub struct SandboxManager {
    pub name: String,
    pub last_stdout: String,
    pub last_stderr: String,
    pub all_stdout: String,
    pub all_stderr: String,
    /* skip --no-config, --storage-dir and -v */
    pub no_default_options: bool,
    /* load config files instead of passing --no-config */
    pub use_config: bool,
    storage: TempDir,
    home: TempDir,
}

impl SandboxManager {
    pub fn new() -> Self {
        #[allow(clippy::expect_used)]
        let storage = tempfile::tempdir().expect("Failed to create storage dir");
        #[allow(clippy::expect_used)]
        let home = tempfile::tempdir().expect("Failed to create home dir");

        Self {
            name: format!("sandbox-test-{}", rid()),
            last_stdout: String::new(),
            last_stderr: String::new(),
            all_stdout: String::new(),
            all_stderr: String::new(),
            no_default_options: false,
            use_config: false,
            storage,
            home,
        }
    }

    pub fn storage_dir(&self) -> &Path {
        self.storage.path()
    }

    #[allow(dead_code)]
    pub fn home_dir(&self) -> &Path {
        self.home.path()
    }

    #[allow(dead_code)]
    pub fn sandbox_dir(&self) -> PathBuf {
        self.storage_dir().join(&self.name)
    }

    /* Lays out the directories of a persisted, unmounted sandbox without
     * going through `new`, which needs root and a base image. */
    #[allow(dead_code)]
    pub fn create_layers(&self, name: &str) -> Result<PathBuf> {
        let base = self.storage_dir().join(name);
        for dir in ["root", "upper", "work", "overlay"] {
            std::fs::create_dir_all(base.join(dir))?;
        }
        Ok(base)
    }

    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(get_sandbox_bin());
        cmd.env("HOME", self.home.path())
            .env_remove("SUDO_UID")
            .env_remove("SUDO_GID")
            .env_remove("SUDO_HOME")
            .env_remove("ARCH_SANDBOX_LOG_LEVEL")
            .env_remove("ARCH_SANDBOX_STORAGE_DIR")
            .env_remove("ARCH_SANDBOX_CACHE_DIR")
            .env_remove("ARCH_SANDBOX_IMAGE")
            .env_remove("ARCH_SANDBOX_TIMEOUT")
            .env_remove("COMPLETE");

        if !self.no_default_options {
            if !self.use_config {
                cmd.arg("--no-config");
            }
            if !args.iter().any(|arg| arg.starts_with("--storage-dir")) {
                cmd.arg(format!("--storage-dir={}", self.storage_dir().display()));
            }
            if !args
                .iter()
                .any(|arg| arg.starts_with("--log-level") || arg.starts_with("-v"))
            {
                cmd.arg("-v");
            }
        }
        cmd.args(args);
        cmd
    }

    pub fn run(&mut self, args: &[&str]) -> Result<Output> {
        let cmd = self.command(args);
        self.execute(cmd)
    }

    #[allow(dead_code)]
    pub fn run_with_env(
        &mut self,
        args: &[&str],
        env_key: &str,
        env_value: &str,
    ) -> Result<Output> {
        let mut cmd = self.command(args);
        cmd.env(env_key, env_value);
        self.execute(cmd)
    }

    #[allow(dead_code)]
    pub fn run_in(&mut self, cwd: &Path, args: &[&str]) -> Result<Output> {
        let mut cmd = self.command(args);
        cmd.current_dir(cwd);
        self.execute(cmd)
    }

    fn execute(&mut self, mut cmd: Command) -> Result<Output> {
        println!(
            "Running command: {} {}",
            cmd.get_program().to_string_lossy(),
            cmd.get_args()
                .map(|c| c.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = cmd
            .output()
            .map_err(|e| anyhow::anyhow!("Command failed: {}", e))?;
        self.last_stdout = String::from_utf8_lossy(&output.stdout).to_string();
        self.last_stderr = String::from_utf8_lossy(&output.stderr).to_string();
        self.all_stdout += &self.last_stdout;
        self.all_stderr += &self.last_stderr;

        match output.status.code() {
            Some(0) => Ok(output),
            Some(code) => Err(anyhow::anyhow!(
                "Command returned non-zero exit code: {}\nstdout: {}\nstderr: {}",
                code,
                self.last_stdout,
                self.last_stderr
            )),
            None => Err(anyhow::anyhow!(
                "Command did not return a valid exit code\nstdout: {}\nstderr: {}",
                self.last_stdout,
                self.last_stderr
            )),
        }
    }

    #[allow(dead_code)]
    pub fn pass(&mut self, args: &[&str]) -> bool {
        if self.run(args).is_ok() {
            return true;
        }
        println!("last_stderr: {}", self.last_stderr);
        println!("last_stdout: {}", self.last_stdout);
        false
    }

    #[allow(dead_code)]
    pub fn xfail(&mut self, args: &[&str]) -> bool {
        if self.run(args).is_err() {
            return true;
        }
        println!("last_stderr: {}", self.last_stderr);
        println!("last_stdout: {}", self.last_stdout);
        false
    }
}

#[fixture]
pub fn sandbox() -> SandboxManager {
    SandboxManager::new()
}
