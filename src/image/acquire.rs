use super::ArchiveFormat;
use crate::error::{Result, SandboxError};
use crate::host::{HostCapabilities, Tool, run_captured};
use crate::util::Lock;
use log::{debug, info, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// The file name an image is cached under: the URL's last path segment.
pub fn cache_key(source_url: &str) -> Result<String> {
    let failure = |reason: &str| SandboxError::DownloadFailure {
        url: source_url.to_string(),
        reason: reason.to_string(),
    };

    let url = reqwest::Url::parse(source_url)
        .map_err(|e| failure(&format!("invalid URL: {}", e)))?;
    let key = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    if key.is_empty() || key == "." || key == ".." {
        return Err(failure("URL does not name a file"));
    }
    Ok(key.to_string())
}

/**
 * Returns the path of a verified copy of `source_url` inside `cache_dir`,
 * downloading it only if no valid copy is cached yet. A cached copy that fails
 * its integrity check is deleted and fetched again, once.
 */
pub fn ensure_base_image(
    host: &HostCapabilities,
    source_url: &str,
    cache_dir: &Path,
    timeout: Option<Duration>,
) -> Result<PathBuf> {
    let key = cache_key(source_url)?;
    let format = ArchiveFormat::from_path(Path::new(&key)).ok_or_else(|| {
        SandboxError::DownloadFailure {
            url: source_url.to_string(),
            reason: format!("unsupported archive type: {}", key),
        }
    })?;
    host.require(&[Tool::Tar, format.tool()])?;

    std::fs::create_dir_all(cache_dir).map_err(|e| {
        SandboxError::io(
            format!("failed to create cache directory {}", cache_dir.display()),
            e,
        )
    })?;

    // Held until we return, so nobody reads a half written archive
    let _lock = Lock::cache(cache_dir, &key)?;
    let archive = cache_dir.join(&key);

    if archive.exists() {
        debug!("Verifying cached image {}", archive.display());
        match verify(host, format, &archive, timeout) {
            Ok(()) => {
                info!("Using cached image {}", archive.display());
                return Ok(archive);
            }
            Err(SandboxError::VerificationFailure { reason, .. }) => {
                warn!(
                    "Cached image {} is invalid, downloading again: {}",
                    archive.display(),
                    reason
                );
                std::fs::remove_file(&archive).map_err(|e| {
                    SandboxError::io(
                        format!(
                            "failed to remove invalid cached image {}",
                            archive.display()
                        ),
                        e,
                    )
                })?;
            }
            Err(e) => return Err(e),
        }
    }

    let partial = cache_dir.join(format!("{}.part", key));
    download(source_url, &partial, timeout)?;

    debug!("Verifying downloaded image {}", partial.display());
    if let Err(e) = verify(host, format, &partial, timeout) {
        let _ = std::fs::remove_file(&partial);
        return Err(match e {
            SandboxError::VerificationFailure { reason, .. } => {
                SandboxError::VerificationFailure {
                    path: archive,
                    reason,
                }
            }
            other => other,
        });
    }

    std::fs::rename(&partial, &archive).map_err(|e| {
        SandboxError::io(
            format!("failed to move download into {}", archive.display()),
            e,
        )
    })?;

    info!("Cached image {}", archive.display());
    Ok(archive)
}

/// Runs the format's decompression self-test against `path`.
pub fn verify(
    host: &HostCapabilities,
    format: ArchiveFormat,
    path: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    let tool = host.path(format.tool())?;
    run_captured(
        Command::new(tool).args(format.verify_args()).arg(path),
        timeout,
    )
    .map_err(|e| SandboxError::VerificationFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn is_loopback(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .is_some_and(|h| {
            h == "localhost"
                || h.parse::<std::net::IpAddr>()
                    .is_ok_and(|ip| ip.is_loopback())
        })
}

fn download(url: &str, dest: &Path, timeout: Option<Duration>) -> Result<()> {
    let failure = |reason: String| SandboxError::DownloadFailure {
        url: url.to_string(),
        reason,
    };

    info!("Downloading {}", url);
    let mut builder = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("arch-sandbox/", env!("CARGO_PKG_VERSION")));
    if is_loopback(url) {
        builder = builder.no_proxy();
    }
    let client = builder.build().map_err(|e| failure(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| failure(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(failure(format!("server responded with {}", status)));
    }

    let mut file = File::create(dest).map_err(|e| {
        SandboxError::io(format!("failed to create {}", dest.display()), e)
    })?;

    let written = match response.copy_to(&mut file) {
        Ok(written) => written,
        Err(e) => {
            drop(file);
            let _ = std::fs::remove_file(dest);
            return Err(failure(e.to_string()));
        }
    };

    file.sync_all().map_err(|e| {
        SandboxError::io(format!("failed to flush {}", dest.display()), e)
    })?;

    debug!("Downloaded {} bytes to {}", written, dest.display());
    Ok(())
}
