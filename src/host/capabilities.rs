use crate::error::{Result, SandboxError};
use log::{debug, trace};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tool {
    Mount,
    Umount,
    Nspawn,
    Chroot,
    Tar,
    Zstd,
    Gzip,
    Xz,
}

impl Tool {
    pub const ALL: [Tool; 8] = [
        Tool::Mount,
        Tool::Umount,
        Tool::Nspawn,
        Tool::Chroot,
        Tool::Tar,
        Tool::Zstd,
        Tool::Gzip,
        Tool::Xz,
    ];

    /// Tools every setup -> launch -> cleanup cycle needs, regardless of image format.
    pub const LIFECYCLE: [Tool; 5] =
        [Tool::Mount, Tool::Umount, Tool::Nspawn, Tool::Chroot, Tool::Tar];

    pub fn executable(&self) -> &'static str {
        match self {
            Tool::Mount => "mount",
            Tool::Umount => "umount",
            Tool::Nspawn => "systemd-nspawn",
            Tool::Chroot => "arch-chroot",
            Tool::Tar => "tar",
            Tool::Zstd => "zstd",
            Tool::Gzip => "gzip",
            Tool::Xz => "xz",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.executable())
    }
}

/**
 * The set of external executables available on this host, resolved once at the
 * start of a lifecycle and handed to every component that shells out.
 */
#[derive(Debug, Clone, Default)]
pub struct HostCapabilities {
    tools: HashMap<Tool, PathBuf>,
}

impl HostCapabilities {
    pub fn probe() -> Self {
        let mut tools = HashMap::new();
        for tool in Tool::ALL {
            match which::which(tool.executable()) {
                Ok(path) => {
                    trace!("Found {} at {}", tool, path.display());
                    tools.insert(tool, path);
                }
                Err(_) => debug!("{} not found on this host", tool),
            }
        }
        HostCapabilities { tools }
    }

    pub fn from_tools<I, P>(tools: I) -> Self
    where
        I: IntoIterator<Item = (Tool, P)>,
        P: Into<PathBuf>,
    {
        HostCapabilities {
            tools: tools.into_iter().map(|(t, p)| (t, p.into())).collect(),
        }
    }

    pub fn has(&self, tool: Tool) -> bool {
        self.tools.contains_key(&tool)
    }

    /// Fails with `DependencyMissing` naming every tool in `tools` that is absent.
    pub fn require(&self, tools: &[Tool]) -> Result<()> {
        let mut missing: Vec<Tool> =
            tools.iter().copied().filter(|t| !self.has(*t)).collect();
        missing.sort();
        missing.dedup();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SandboxError::DependencyMissing {
                tools: missing.iter().map(|t| t.to_string()).collect(),
            })
        }
    }

    pub fn path(&self, tool: Tool) -> Result<&Path> {
        self.tools.get(&tool).map(|p| p.as_path()).ok_or_else(|| {
            SandboxError::DependencyMissing {
                tools: vec![tool.to_string()],
            }
        })
    }
}
