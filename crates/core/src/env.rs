// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment selection and path derivation.
//!
//! This module is pure: it never touches environment variables or the
//! filesystem. The daemon crate's `env` module reads `APP_ENV` and the state
//! directory variables, then calls into [`EnvironmentContext::new`] to
//! materialize the paths a running process actually uses.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A named deployment context with its own on-disk root and policy defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvName {
    Development,
    Staging,
    Production,
}

crate::simple_display! {
    EnvName {
        Development => "development",
        Staging => "staging",
        Production => "production",
    }
}

impl EnvName {
    /// Parse from the exact allowed values; anything else is rejected rather
    /// than silently coerced.
    pub fn parse(s: &str) -> Result<Self, EnvError> {
        match s {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(EnvError::InvalidName(other.to_string())),
        }
    }

    /// Directory segment this env is rooted under (same as its display form).
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl Default for EnvName {
    fn default() -> Self {
        Self::Development
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("invalid environment name {0:?} (expected development|staging|production)")]
    InvalidName(String),
}

/// Resolved path and policy root for one environment.
///
/// Constructed once at startup from an explicit selector and never mutated
/// in place; a process that wants a different env restarts instead of
/// remapping these paths underneath itself.
#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    env: EnvName,
    data_dir: PathBuf,
    log_dir: PathBuf,
    runtime_dir: PathBuf,
    endpoint_file: PathBuf,
    db_path: PathBuf,
}

impl EnvironmentContext {
    /// Derive the standard per-env layout under `state_root` (for runtime
    /// artifacts: sockets, pid/lock files, logs, data) and `config_root`
    /// (for the discovery descriptor, which conventionally lives alongside
    /// other per-user config rather than transient runtime state).
    pub fn new(env: EnvName, state_root: &Path, config_root: &Path) -> Self {
        let env_state_root = state_root.join(env.dir_name());
        let env_config_root = config_root.join(env.dir_name());
        Self {
            env,
            data_dir: env_state_root.join("data"),
            log_dir: env_state_root.join("logs"),
            runtime_dir: env_state_root.join("run"),
            endpoint_file: env_config_root.join("daemon.endpoint"),
            db_path: env_state_root.join("data").join("assistant.db"),
        }
    }

    pub fn env(&self) -> EnvName {
        self.env
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Parent directory for the Unix socket / named pipe; kept owner-only
    /// (mode 0700 on POSIX) and separate from `data_dir` since it only ever
    /// holds transient runtime artifacts.
    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    pub fn endpoint_file(&self) -> &Path {
        &self.endpoint_file
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
