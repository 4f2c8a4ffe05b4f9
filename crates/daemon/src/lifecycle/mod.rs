// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, endpoint publication.

mod endpoint;
mod startup;

pub use endpoint::EndpointPublisher;
pub use startup::{startup, StartupResult};

use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use assistantd_core::EnvironmentContext;
use thiserror::Error;
use tracing::{info, warn};

/// Daemon configuration: every path the lifecycle layer touches, derived
/// once from an [`EnvironmentContext`] and never recomputed.
#[derive(Debug, Clone)]
pub struct Config {
    pub ctx: EnvironmentContext,
    /// Path to the Unix socket (or named pipe name, platform-dependent).
    pub socket_path: PathBuf,
    /// Path to the lock/PID file.
    pub lock_path: PathBuf,
    /// Path to the version marker file.
    pub version_path: PathBuf,
    /// Path to the per-connector lockfiles directory.
    pub connectors_path: PathBuf,
}

impl Config {
    pub fn from_context(ctx: EnvironmentContext) -> Self {
        let runtime_dir = ctx.runtime_dir().to_path_buf();
        let data_dir = ctx.data_dir().to_path_buf();
        Self {
            socket_path: runtime_dir.join("daemon.sock"),
            lock_path: data_dir.join("daemon.pid"),
            version_path: data_dir.join("daemon.version"),
            connectors_path: data_dir.join("connectors"),
            ctx,
        }
    }
}

/// Daemon state held for the lifetime of the process.
pub struct DaemonState {
    pub config: Config,
    // Held only to maintain the exclusive file lock; released on drop.
    #[allow(dead_code)]
    lock_file: File,
    pub start_time: Instant,
    publisher: EndpointPublisher,
}

impl DaemonState {
    /// Graceful shutdown: remove the published endpoint, then the runtime
    /// artifacts that only make sense while a listener is bound. The lock
    /// file is released last, implicitly, when `self.lock_file` drops.
    pub fn shutdown(&mut self) {
        info!("shutting down daemon");

        self.publisher.remove();

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!(error = %e, "failed to remove socket file");
            }
        }
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove pid file");
            }
        }
        if self.config.version_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.version_path) {
                warn!(error = %e, "failed to remove version file");
            }
        }

        info!("daemon shutdown complete");
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("daemon already running")]
    LockFailed(#[source] std::io::Error),

    #[error("endpoint file at {0} refers to a live daemon (pid {1})")]
    EndpointConflict(PathBuf, u32),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
