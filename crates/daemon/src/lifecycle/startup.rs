// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup sequencing.

use std::io::Write as _;

use fs2::FileExt as _;
use tokio::net::UnixListener;
use tracing::info;

use super::{Config, DaemonState, EndpointPublisher, LifecycleError};

/// Result of a successful startup: the daemon state plus the bound
/// listener, handed off separately so the caller can spawn the accept loop.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

pub async fn startup(config: Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config.clone()).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Lock/endpoint conflicts mean another instance owns these
            // files; cleaning them up would tear down the live daemon.
            if !matches!(e, LifecycleError::LockFailed(_) | LifecycleError::EndpointConflict(..)) {
                cleanup_on_failure(&config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(config.ctx.data_dir())?;
    std::fs::create_dir_all(config.ctx.log_dir())?;
    std::fs::create_dir_all(&config.connectors_path)?;
    create_runtime_dir(config.ctx.runtime_dir())?;

    // Acquire the exclusive lock first so two daemons racing for the same
    // env never both reach the bind step.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    std::fs::write(&config.version_path, crate::env::PROTOCOL_VERSION)?;

    let endpoint_path = config.ctx.endpoint_file().to_path_buf();
    EndpointPublisher::check_stale(&endpoint_path)?;

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    let mut publisher = EndpointPublisher::new(endpoint_path);
    let address = config.socket_path.to_string_lossy().into_owned();
    publisher.publish("unix", &address)?;

    info!(socket = %config.socket_path.display(), "daemon started");

    Ok(StartupResult {
        daemon: DaemonState {
            config,
            lock_file,
            start_time: std::time::Instant::now(),
            publisher,
        },
        listener,
    })
}

#[cfg(unix)]
fn create_runtime_dir(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::create_dir_all(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn create_runtime_dir(path: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}

fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
