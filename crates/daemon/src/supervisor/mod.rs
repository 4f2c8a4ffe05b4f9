// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the lifecycle of native child "connector" processes: spawn,
//! heartbeat, restart-with-backoff, and drain. Each connector gets its own
//! actor task with a private command queue so state transitions for that
//! connector are totally ordered, matching spec.md §5's concurrency model.

mod actor;
mod spawn;

pub use spawn::generate_admission_token;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

use actor::{Command, ConnectorActor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Never,
    OnFailure,
    Always,
}

assistantd_core::simple_display! {
    RestartPolicy {
        Never => "never",
        OnFailure => "on-failure",
        Always => "always",
    }
}

#[derive(Debug, Clone)]
pub struct ConnectorDescriptor {
    pub connector_id: String,
    pub display_name: String,
    pub executable: PathBuf,
    pub argv: Vec<String>,
    pub capabilities: Vec<String>,
    pub restart_policy: RestartPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

assistantd_core::simple_display! {
    ConnectorState {
        Stopped => "STOPPED",
        Starting => "STARTING",
        Running => "RUNNING",
        Stopping => "STOPPING",
        Error => "ERROR",
    }
}

#[derive(Debug, Clone)]
pub struct ConnectorSnapshot {
    pub state: ConnectorState,
    pub last_heartbeat_at: Option<Instant>,
    pub restart_count: u32,
    pub data_counter: u64,
    pub error_code: Option<String>,
}

impl ConnectorSnapshot {
    fn initial() -> Self {
        Self { state: ConnectorState::Stopped, last_heartbeat_at: None, restart_count: 0, data_counter: 0, error_code: None }
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("no connector registered with id {0:?}")]
    NotFound(String),
    #[error("connector did not reach RUNNING within the start deadline")]
    StartTimedOut,
    #[error("connector failed to start: {0}")]
    StartFailed(String),
    #[error("connector actor task is gone")]
    ActorGone,
}

/// Tunables the actor needs; read once at supervisor construction from
/// `crate::env` so every connector shares the same deadlines unless a
/// future per-descriptor override is added.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorTuning {
    pub heartbeat_deadline: Duration,
    pub start_deadline: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub backoff_window: Duration,
    pub stable_runtime: Duration,
    pub max_restarts: u32,
}

struct ConnectorHandle {
    descriptor: ConnectorDescriptor,
    commands: mpsc::Sender<Command>,
    watch: watch::Receiver<ConnectorSnapshot>,
}

pub struct Supervisor {
    connectors: HashMap<String, ConnectorHandle>,
    connectors_dir: PathBuf,
    tuning: SupervisorTuning,
}

impl Supervisor {
    pub fn new(connectors_dir: PathBuf, tuning: SupervisorTuning) -> Self {
        Self { connectors: HashMap::new(), connectors_dir, tuning }
    }

    /// Register a known connector descriptor, spinning up its (initially
    /// STOPPED) actor task. Registration happens at startup or on an admin
    /// mutation; it is not itself part of the request-time FSM.
    pub fn register(&mut self, descriptor: ConnectorDescriptor) {
        let (tx, rx) = mpsc::channel(32);
        let (watch_tx, watch_rx) = watch::channel(ConnectorSnapshot::initial());
        let connector_dir = self.connectors_dir.join(&descriptor.connector_id);
        let actor = ConnectorActor::new(descriptor.clone(), connector_dir, self.tuning, tx.clone(), rx, watch_tx);
        tokio::spawn(actor.run());
        self.connectors.insert(descriptor.connector_id.clone(), ConnectorHandle { descriptor, commands: tx, watch: watch_rx });
    }

    pub fn list(&self) -> Vec<(ConnectorDescriptor, ConnectorSnapshot)> {
        self.connectors
            .values()
            .map(|handle| (handle.descriptor.clone(), handle.watch.borrow().clone()))
            .collect()
    }

    pub fn status(&self, connector_id: &str) -> Result<ConnectorSnapshot, SupervisorError> {
        self.handle(connector_id).map(|handle| handle.watch.borrow().clone())
    }

    pub async fn start(&self, connector_id: &str) -> Result<ConnectorSnapshot, SupervisorError> {
        let handle = self.handle(connector_id)?;
        let mut watch = handle.watch.clone();
        let (tx, rx) = oneshot::channel();
        handle
            .commands
            .send(Command::Start { respond: tx })
            .await
            .map_err(|_| SupervisorError::ActorGone)?;
        rx.await.map_err(|_| SupervisorError::ActorGone)??;

        let deadline = tokio::time::Instant::now() + self.tuning.start_deadline;
        loop {
            let snapshot = watch.borrow().clone();
            match snapshot.state {
                ConnectorState::Running => return Ok(snapshot),
                ConnectorState::Error => {
                    return Err(SupervisorError::StartFailed(
                        snapshot.error_code.unwrap_or_default(),
                    ))
                }
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SupervisorError::StartTimedOut);
            }
            if tokio::time::timeout_at(deadline, watch.changed()).await.is_err() {
                return Err(SupervisorError::StartTimedOut);
            }
        }
    }

    pub async fn stop(&self, connector_id: &str, grace: Duration) -> Result<ConnectorSnapshot, SupervisorError> {
        let handle = self.handle(connector_id)?;
        let (tx, rx) = oneshot::channel();
        handle
            .commands
            .send(Command::Stop { grace, respond: tx })
            .await
            .map_err(|_| SupervisorError::ActorGone)?;
        rx.await.map_err(|_| SupervisorError::ActorGone)?
    }

    pub async fn heartbeat(&self, connector_id: &str, payload: Value) -> Result<(), SupervisorError> {
        let handle = self.handle(connector_id)?;
        let (tx, rx) = oneshot::channel();
        handle
            .commands
            .send(Command::Heartbeat { payload, respond: tx })
            .await
            .map_err(|_| SupervisorError::ActorGone)?;
        rx.await.map_err(|_| SupervisorError::ActorGone)?
    }

    pub async fn report_error(&self, connector_id: &str, code: String, message: String) -> Result<(), SupervisorError> {
        let handle = self.handle(connector_id)?;
        let (tx, rx) = oneshot::channel();
        handle
            .commands
            .send(Command::ReportError { code, message, respond: tx })
            .await
            .map_err(|_| SupervisorError::ActorGone)?;
        rx.await.map_err(|_| SupervisorError::ActorGone)
    }

    fn handle(&self, connector_id: &str) -> Result<&ConnectorHandle, SupervisorError> {
        self.connectors.get(connector_id).ok_or_else(|| SupervisorError::NotFound(connector_id.to_string()))
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if !self.connectors.is_empty() {
            warn!(count = self.connectors.len(), "supervisor dropped with connectors still registered");
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
