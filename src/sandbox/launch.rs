use super::{Sandbox, SandboxState};
use crate::error::Result;
use crate::host::HostCapabilities;
use crate::launch::{LaunchIntent, launch};

impl Sandbox {
    /// Runs the interactive container on the mounted overlay. A failed session
    /// does not clean anything up, that's left to the caller.
    pub fn launch(&mut self, host: &HostCapabilities, intent: &LaunchIntent) -> Result<()> {
        self.state = SandboxState::Running;
        launch(host, &self.overlay_dir, &self.name, intent)
    }
}
