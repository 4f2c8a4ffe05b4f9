// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The discovery descriptor file: `transport=`/`address=`/`pid=`, written
//! atomically with owner-only permissions, and the stale-descriptor check
//! run before a fresh listener binds.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::LifecycleError;

/// Owns the endpoint descriptor file: creates it once the listener is
/// bound, removes it on clean shutdown.
pub struct EndpointPublisher {
    path: PathBuf,
    published: bool,
}

impl EndpointPublisher {
    pub fn new(path: PathBuf) -> Self {
        Self { path, published: false }
    }

    /// Inspect an existing descriptor at `path` before startup. A dead pid
    /// means the file is stale and can be cleared; a live pid means another
    /// daemon instance already owns this environment.
    pub fn check_stale(path: &Path) -> Result<(), LifecycleError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(LifecycleError::Io(e)),
        };

        let pid = contents
            .lines()
            .find_map(|line| line.strip_prefix("pid="))
            .and_then(|s| s.trim().parse::<i32>().ok());

        match pid {
            Some(pid) if pid_is_alive(pid) => {
                Err(LifecycleError::EndpointConflict(path.to_path_buf(), pid as u32))
            }
            _ => {
                warn!(path = %path.display(), "removing stale endpoint descriptor");
                match std::fs::remove_file(path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(LifecycleError::Io(e)),
                }
            }
        }
    }

    /// Write the descriptor atomically: temp file in the same directory,
    /// mode 0600, then rename over the final path.
    pub fn publish(&mut self, transport: &str, address: &str) -> Result<(), LifecycleError> {
        let parent = self.path.parent().ok_or(LifecycleError::NoStateDir)?;
        std::fs::create_dir_all(parent)?;

        let tmp_path = parent.join(format!(".daemon.endpoint.{}.tmp", std::process::id()));
        let mut tmp = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        writeln!(tmp, "transport={transport}")?;
        writeln!(tmp, "address={address}")?;
        writeln!(tmp, "pid={}", std::process::id())?;
        tmp.sync_all()?;
        drop(tmp);

        std::fs::rename(&tmp_path, &self.path)?;
        self.published = true;
        Ok(())
    }

    /// Remove the descriptor on clean shutdown. Idempotent; tolerant of the
    /// file already being gone.
    pub fn remove(&mut self) {
        if !self.published {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to remove endpoint descriptor");
            }
        }
        self.published = false;
    }
}

#[cfg(unix)]
fn pid_is_alive(pid: i32) -> bool {
    use nix::unistd::Pid;
    nix::sys::signal::kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: i32) -> bool {
    // Conservative: assume alive so we never clobber a live foreign daemon's
    // descriptor on platforms without a liveness probe wired up yet.
    true
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
