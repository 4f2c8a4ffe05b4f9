// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process creation for a connector child: command construction, the
//! one-time admission token, and line-by-line stdout/stderr capture into
//! structured logs.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};
use uuid::Uuid;

use super::ConnectorDescriptor;

/// An unforgeable, single-use, short-lived token presented by the child on
/// its first `Hello` so the Supervisor can tell a legitimate connector
/// apart from any other local process that happens to find the socket.
/// spec.md §9 leaves the exact format open; a v4 UUID is unforgeable enough
/// for a same-host, single-use credential and costs nothing to generate.
pub fn generate_admission_token() -> String {
    Uuid::new_v4().to_string()
}

/// Spawn the connector's executable with its declared argv, piping
/// stdout/stderr for capture and forwarding the admission token via
/// environment variable.
pub fn spawn_child(
    descriptor: &ConnectorDescriptor,
    admission_token: &str,
    connector_dir: &Path,
) -> std::io::Result<Child> {
    std::fs::create_dir_all(connector_dir)?;

    let mut command = Command::new(&descriptor.executable);
    command
        .args(&descriptor.argv)
        .current_dir(connector_dir)
        .env("ASSISTANTD_CONNECTOR_ID", &descriptor.connector_id)
        .env("ASSISTANTD_ADMISSION_TOKEN", admission_token)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let mut child = command.spawn()?;

    if let Some(stdout) = child.stdout.take() {
        spawn_log_drain(descriptor.connector_id.clone(), "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_log_drain(descriptor.connector_id.clone(), "stderr", stderr);
    }

    Ok(child)
}

fn spawn_log_drain<R>(connector_id: String, stream: &'static str, reader: R)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => debug!(connector = %connector_id, stream, "{}", line),
                Ok(None) => break,
                Err(e) => {
                    warn!(connector = %connector_id, stream, error = %e, "log drain read error");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
