use crate::overlay::OverlayLayers;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a sandbox is in its setup -> launch -> cleanup cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SandboxState {
    Uninitialized,
    DirectoriesReady,
    ImageReady,
    Mounted,
    Running,
    Unmounted,
    Persisted,
    Destroyed,
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SandboxState::Uninitialized => "uninitialized",
            SandboxState::DirectoriesReady => "directories-ready",
            SandboxState::ImageReady => "image-ready",
            SandboxState::Mounted => "mounted",
            SandboxState::Running => "running",
            SandboxState::Unmounted => "unmounted",
            SandboxState::Persisted => "persisted",
            SandboxState::Destroyed => "destroyed",
        };
        write!(f, "{}", s)
    }
}

pub struct Sandbox {
    pub name: String,
    pub persist: bool,
    pub base: PathBuf,
    pub root_dir: PathBuf,    // lower layer, the extracted image
    pub upper_dir: PathBuf,   // everything written inside the sandbox
    pub work_dir: PathBuf,    // overlayfs scratch space
    pub overlay_dir: PathBuf, // merged view the container runs in
    pub image_source: String,
    pub state: SandboxState,
}

impl Sandbox {
    pub fn from_location(
        storage_dir: &Path,
        name: &str,
        persist: bool,
        image_source: &str,
    ) -> Sandbox {
        let base = storage_dir.join(name);
        Sandbox {
            name: name.to_string(),
            persist,
            root_dir: base.join("root"),
            upper_dir: base.join("upper"),
            work_dir: base.join("work"),
            overlay_dir: base.join("overlay"),
            base,
            image_source: image_source.to_string(),
            state: SandboxState::Uninitialized,
        }
    }

    pub fn layers(&self) -> OverlayLayers<'_> {
        OverlayLayers {
            lower: &self.root_dir,
            upper: &self.upper_dir,
            work: &self.work_dir,
            merged: &self.overlay_dir,
        }
    }

    /// Present once the root layer has been extracted and fixed up.
    pub fn ready_marker(&self) -> PathBuf {
        self.base.join("root.ready")
    }
}
