// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parses the daemon's published endpoint descriptor: `transport=`/
//! `address=`/`pid=` lines, written atomically by the daemon's
//! `EndpointPublisher`. Read fresh on every connect and reconnect attempt
//! so a daemon restart with a new socket path is picked up automatically.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub transport: String,
    pub address: String,
    pub pid: u32,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no endpoint descriptor at {0}: daemon is not running in this environment")]
    NotFound(std::path::PathBuf),
    #[error("endpoint descriptor at {0} is missing required field {1:?}")]
    MissingField(std::path::PathBuf, &'static str),
    #[error("io error reading {0}: {1}")]
    Io(std::path::PathBuf, std::io::Error),
}

impl Endpoint {
    /// Read and parse the descriptor at `path`. Unknown lines are ignored
    /// rather than rejected, so the daemon can add fields without breaking
    /// older connector clients.
    pub fn read(path: &Path) -> Result<Self, DiscoveryError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DiscoveryError::NotFound(path.to_path_buf())
            } else {
                DiscoveryError::Io(path.to_path_buf(), e)
            }
        })?;

        let mut transport = None;
        let mut address = None;
        let mut pid = None;
        for line in contents.lines() {
            if let Some(v) = line.strip_prefix("transport=") {
                transport = Some(v.to_string());
            } else if let Some(v) = line.strip_prefix("address=") {
                address = Some(v.to_string());
            } else if let Some(v) = line.strip_prefix("pid=") {
                pid = v.trim().parse::<u32>().ok();
            }
        }

        Ok(Self {
            transport: transport.ok_or(DiscoveryError::MissingField(path.to_path_buf(), "transport"))?,
            address: address.ok_or(DiscoveryError::MissingField(path.to_path_buf(), "address"))?,
            pid: pid.ok_or(DiscoveryError::MissingField(path.to_path_buf(), "pid"))?,
        })
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
