// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.
//!
//! This is the only place that reads `std::env`; everything else takes
//! these values as plain arguments so it stays testable without mutating
//! process-global state.

use std::path::PathBuf;
use std::time::Duration;

use assistantd_core::{EnvError, EnvName, EnvironmentContext};

use crate::lifecycle::LifecycleError;

/// Protocol/app version advertised in `Hello`/`/version` responses.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve the active environment: an explicit CLI flag wins, falling back
/// to `APP_ENV`, falling back to `development`.
pub fn resolve_env(cli_flag: Option<&str>) -> Result<EnvName, EnvError> {
    if let Some(flag) = cli_flag {
        return EnvName::parse(flag);
    }
    match std::env::var("APP_ENV") {
        Ok(val) => EnvName::parse(&val),
        Err(_) => Ok(EnvName::default()),
    }
}

/// Resolve state directory: `ASSISTANTD_STATE_DIR` > `XDG_STATE_HOME`/assistantd
/// > `~/.local/state/assistantd`.
pub fn state_root() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("ASSISTANTD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("assistantd"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/assistantd"))
}

/// Resolve config directory: `ASSISTANTD_CONFIG_DIR` > `XDG_CONFIG_HOME`/assistantd
/// > `~/.config/assistantd`. The endpoint descriptor file lives here, distinct
/// from the transient runtime state directory.
pub fn config_root() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("ASSISTANTD_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("assistantd"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".config/assistantd"))
}

pub fn build_context(env: EnvName) -> Result<EnvironmentContext, LifecycleError> {
    Ok(EnvironmentContext::new(env, &state_root()?, &config_root()?))
}

fn duration_ms_var(name: &str, default_ms: u64) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(default_ms))
}

/// Per-route request/response deadline (read and write).
pub fn ipc_timeout() -> Duration {
    duration_ms_var("ASSISTANTD_IPC_TIMEOUT_MS", 10_000)
}

/// Graceful-shutdown drain budget before inflight requests are force-closed.
pub fn drain_timeout() -> Duration {
    duration_ms_var("ASSISTANTD_DRAIN_TIMEOUT_MS", 5_000)
}

/// Outer deadline a route handler is allowed to run for before its
/// cancellation token fires and the caller receives `TIMEOUT`, independent
/// of `ipc_timeout` which only bounds frame I/O.
pub fn route_deadline() -> Duration {
    duration_ms_var("ASSISTANTD_ROUTE_DEADLINE_MS", 10_000)
}

/// Time since `last_heartbeat_at` after which a RUNNING connector is declared ERROR.
pub fn heartbeat_deadline() -> Duration {
    duration_ms_var("ASSISTANTD_HEARTBEAT_DEADLINE_MS", 15_000)
}

/// Time a `start(id)` call waits for STARTING -> RUNNING before failing.
pub fn start_deadline() -> Duration {
    duration_ms_var("ASSISTANTD_START_DEADLINE_MS", 10_000)
}

/// Base restart backoff delay (doubles on each consecutive failure).
pub fn backoff_base() -> Duration {
    duration_ms_var("ASSISTANTD_BACKOFF_BASE_MS", 500)
}

/// Restart backoff ceiling.
pub fn backoff_cap() -> Duration {
    duration_ms_var("ASSISTANTD_BACKOFF_CAP_MS", 30_000)
}

/// Rolling window the restart counter is measured against before pinning ERROR.
pub fn backoff_window() -> Duration {
    duration_ms_var("ASSISTANTD_BACKOFF_WINDOW_MS", 5 * 60_000)
}

/// Continuous RUNNING duration after which the restart counter resets to zero.
pub fn stable_runtime() -> Duration {
    duration_ms_var("ASSISTANTD_STABLE_RUNTIME_MS", 60_000)
}

/// Restarts allowed within `backoff_window()` before pinning at ERROR.
pub fn max_restarts() -> u32 {
    std::env::var("ASSISTANTD_MAX_RESTARTS").ok().and_then(|s| s.parse().ok()).unwrap_or(5)
}

/// Per-connection inflight request cap before `RATE_LIMIT_CONNECTION_SATURATED`.
pub fn inflight_cap() -> usize {
    std::env::var("ASSISTANTD_INFLIGHT_CAP").ok().and_then(|s| s.parse().ok()).unwrap_or(64)
}

/// How long the writer queue may stay full before the connection is torn down.
pub fn write_stall_deadline() -> Duration {
    duration_ms_var("ASSISTANTD_WRITE_STALL_DEADLINE_MS", 5_000)
}

/// Window within which identical (code, route, connection) errors collapse
/// to a single outward response plus one log entry.
pub fn error_dedupe_window() -> Duration {
    duration_ms_var("ASSISTANTD_ERROR_DEDUPE_WINDOW_MS", 5_000)
}

/// Per-session token clients may present in `Hello`/`auth.token`. Unset means
/// no optional-token check is layered on top of peer-credential auth.
pub fn session_token() -> Option<String> {
    std::env::var("ASSISTANTD_SESSION_TOKEN").ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
