use super::{Sandbox, SandboxState};
use crate::config::{Config, SandboxConfig};
use crate::error::{Result, SandboxError, SetupError};
use crate::host::{HostCapabilities, Tool};
use crate::image::{
    ArchiveFormat, Owner, cache_key, ensure_base_image, extract_base_image,
    fix_permissions,
};
use crate::overlay;
use log::{debug, info, warn};
use std::path::Path;

impl Sandbox {
    /**
     * Takes the sandbox from nothing to a mounted overlay with the configured
     * bind mounts and packages in place.
     *
     * Not transactional: on failure everything done so far is left on disk, and
     * the error says which state was reached so the caller can decide whether
     * to clean up.
     */
    pub fn setup(
        &mut self,
        host: &HostCapabilities,
        settings: &Config,
        config: &SandboxConfig,
    ) -> Result<(), SetupError> {
        self.run_setup(host, settings, config)
            .map_err(|source| SetupError {
                name: self.name.clone(),
                reached: self.state,
                source,
            })
    }

    fn run_setup(
        &mut self,
        host: &HostCapabilities,
        settings: &Config,
        config: &SandboxConfig,
    ) -> Result<()> {
        self.create_directories()?;
        self.state = SandboxState::DirectoriesReady;
        debug!("Sandbox {} directories ready under {}", self.name, self.base.display());

        let key = cache_key(&self.image_source)?;
        let format = ArchiveFormat::from_path(Path::new(&key)).ok_or_else(|| {
            SandboxError::DownloadFailure {
                url: self.image_source.clone(),
                reason: format!("unsupported archive type: {}", key),
            }
        })?;
        let mut required = Tool::LIFECYCLE.to_vec();
        required.push(format.tool());
        host.require(&required)?;

        let archive = ensure_base_image(
            host,
            &self.image_source,
            &settings.cache_dir,
            settings.timeout,
        )?;
        self.prepare_root(host, &archive, settings)?;
        self.state = SandboxState::ImageReady;

        overlay::mount(host, &self.layers(), settings.timeout)?;
        self.state = SandboxState::Mounted;

        self.bind_mounts(host, &config.mounts, settings.timeout)?;
        self.install_packages(host, &config.packages, settings.timeout)?;

        info!("Sandbox {} is ready", self.name);
        Ok(())
    }

    fn create_directories(&self) -> Result<()> {
        for dir in [
            &self.base,
            &self.root_dir,
            &self.upper_dir,
            &self.work_dir,
            &self.overlay_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| {
                SandboxError::io(format!("failed to create {}", dir.display()), e)
            })?;
        }
        Ok(())
    }

    /// Image URL the root layer was extracted from, if it has been prepared.
    fn recorded_image(&self) -> Option<String> {
        std::fs::read_to_string(self.ready_marker())
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Extracts the image into the root layer unless an earlier setup already did.
    fn prepare_root(
        &self,
        host: &HostCapabilities,
        archive: &Path,
        settings: &Config,
    ) -> Result<()> {
        let marker = self.ready_marker();
        if marker.exists() {
            match self.recorded_image() {
                Some(recorded) if recorded != self.image_source => warn!(
                    "Sandbox {} was built from {}, not {}; keeping its existing root. \
                     Delete the sandbox to rebuild it from the new image",
                    self.name, recorded, self.image_source
                ),
                _ => debug!(
                    "Root layer of {} already prepared, skipping extraction",
                    self.name
                ),
            }
            return Ok(());
        }

        // Leftovers of an interrupted extraction would defeat the bootstrap
        // root detection
        std::fs::remove_dir_all(&self.root_dir)
            .and_then(|_| std::fs::create_dir(&self.root_dir))
            .map_err(|e| {
                SandboxError::io(
                    format!("failed to reset {}", self.root_dir.display()),
                    e,
                )
            })?;

        extract_base_image(host, archive, &self.root_dir, settings.timeout)?;
        fix_permissions(&self.root_dir, Owner::root())?;

        std::fs::write(&marker, &self.image_source).map_err(|e| {
            SandboxError::io(format!("failed to write {}", marker.display()), e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TIMEOUT;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn settings(storage: &Path) -> Config {
        Config {
            log_level: log::LevelFilter::Info,
            storage_dir: storage.to_path_buf(),
            cache_dir: storage.join(".cache"),
            image: "https://example.invalid/bootstrap.tar.gz".to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            sources: HashMap::new(),
        }
    }

    #[test]
    fn test_missing_dependencies_stop_after_directories() {
        let storage = tempfile::tempdir().unwrap();
        let settings = settings(storage.path());
        let mut sandbox =
            Sandbox::from_location(storage.path(), "dev", false, &settings.image);

        let err = sandbox
            .setup(
                &HostCapabilities::default(),
                &settings,
                &SandboxConfig::default(),
            )
            .unwrap_err();

        assert_eq!(err.reached, SandboxState::DirectoriesReady);
        assert_eq!(sandbox.state, SandboxState::DirectoriesReady);
        match err.source {
            SandboxError::DependencyMissing { tools } => {
                assert!(tools.contains(&"systemd-nspawn".to_string()));
                assert!(tools.contains(&"gzip".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sandbox.exists());
        assert!(sandbox.root_dir.is_dir());
    }

    #[test]
    fn test_unsupported_image_is_rejected() {
        let storage = tempfile::tempdir().unwrap();
        let settings = settings(storage.path());
        let mut sandbox = Sandbox::from_location(
            storage.path(),
            "dev",
            false,
            "https://example.invalid/bootstrap.zip",
        );
        let err = sandbox
            .setup(&HostCapabilities::probe(), &settings, &SandboxConfig::default())
            .unwrap_err();
        assert!(matches!(err.source, SandboxError::DownloadFailure { .. }));
    }

    #[test]
    fn test_prepared_root_is_not_extracted_again() {
        let storage = tempfile::tempdir().unwrap();
        let settings = settings(storage.path());
        let sandbox =
            Sandbox::from_location(storage.path(), "dev", true, &settings.image);
        sandbox.create_directories().unwrap();
        std::fs::write(sandbox.root_dir.join("kept"), "").unwrap();
        std::fs::write(sandbox.ready_marker(), "").unwrap();

        // A host without tar would fail if extraction were attempted
        sandbox
            .prepare_root(
                &HostCapabilities::default(),
                &PathBuf::from("/nonexistent.tar.gz"),
                &settings,
            )
            .unwrap();
        assert!(sandbox.root_dir.join("kept").exists());
    }

    #[test]
    fn test_prepared_root_from_other_image_is_kept() {
        let storage = tempfile::tempdir().unwrap();
        let settings = settings(storage.path());
        let sandbox = Sandbox::from_location(
            storage.path(),
            "dev",
            true,
            "https://example.invalid/newer.tar.gz",
        );
        sandbox.create_directories().unwrap();
        std::fs::write(sandbox.root_dir.join("kept"), "").unwrap();
        std::fs::write(sandbox.ready_marker(), &settings.image).unwrap();

        assert_eq!(sandbox.recorded_image(), Some(settings.image.clone()));
        sandbox
            .prepare_root(
                &HostCapabilities::default(),
                &PathBuf::from("/nonexistent.tar.gz"),
                &settings,
            )
            .unwrap();
        assert!(sandbox.root_dir.join("kept").exists());
        assert_eq!(sandbox.recorded_image(), Some(settings.image));
    }
}
