// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-connector actor: one task owns the child process handle and
//! serializes every state transition through its own command queue, per
//! spec.md §5's "consecutive operations on the same connector are totally
//! ordered" rule.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

use super::spawn;
use super::{ConnectorDescriptor, ConnectorSnapshot, ConnectorState, RestartPolicy, SupervisorError, SupervisorTuning};

pub(super) enum Command {
    Start { respond: oneshot::Sender<Result<(), SupervisorError>> },
    Stop { grace: Duration, respond: oneshot::Sender<Result<ConnectorSnapshot, SupervisorError>> },
    Heartbeat { payload: Value, respond: oneshot::Sender<Result<(), SupervisorError>> },
    ReportError { code: String, message: String, respond: oneshot::Sender<()> },
}

pub(super) struct ConnectorActor {
    descriptor: ConnectorDescriptor,
    connector_dir: PathBuf,
    tuning: SupervisorTuning,
    #[allow(dead_code)]
    commands_tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
    watch_tx: watch::Sender<ConnectorSnapshot>,
    snapshot: ConnectorSnapshot,
    child: Option<Child>,
    running_since: Option<Instant>,
    restart_timestamps: VecDeque<Instant>,
}

impl ConnectorActor {
    pub(super) fn new(
        descriptor: ConnectorDescriptor,
        connector_dir: PathBuf,
        tuning: SupervisorTuning,
        commands_tx: mpsc::Sender<Command>,
        rx: mpsc::Receiver<Command>,
        watch_tx: watch::Sender<ConnectorSnapshot>,
    ) -> Self {
        Self {
            descriptor,
            connector_dir,
            tuning,
            commands_tx,
            rx,
            watch_tx,
            snapshot: ConnectorSnapshot::initial(),
            child: None,
            running_since: None,
            restart_timestamps: VecDeque::new(),
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            let child_exit = async {
                match &mut self.child {
                    Some(child) => child.wait().await,
                    None => std::future::pending().await,
                }
            };

            let heartbeat_timeout = async {
                match self.next_heartbeat_deadline() {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(Command::Start { respond }) => {
                            let _ = respond.send(self.handle_start());
                        }
                        Some(Command::Stop { grace, respond }) => {
                            let result = self.handle_stop(grace).await;
                            let _ = respond.send(result);
                        }
                        Some(Command::Heartbeat { payload, respond }) => {
                            let result = self.handle_heartbeat(payload);
                            let _ = respond.send(result);
                        }
                        Some(Command::ReportError { code, message, respond }) => {
                            self.handle_report_error(code, message);
                            let _ = respond.send(());
                        }
                        None => break,
                    }
                }
                status = child_exit, if self.child.is_some() => {
                    self.on_child_exit(status).await;
                }
                () = heartbeat_timeout => {
                    self.handle_heartbeat_timeout();
                }
            }
        }
    }

    /// The instant the RUNNING connector's heartbeat deadline next expires,
    /// or `None` when it isn't RUNNING and so isn't subject to the deadline.
    fn next_heartbeat_deadline(&self) -> Option<tokio::time::Instant> {
        if self.snapshot.state != ConnectorState::Running {
            return None;
        }
        let last = self.snapshot.last_heartbeat_at.or(self.running_since)?;
        Some(tokio::time::Instant::from_std(last) + self.tuning.heartbeat_deadline)
    }

    fn handle_heartbeat_timeout(&mut self) {
        warn!(connector = %self.descriptor.connector_id, "missed heartbeat deadline, marking ERROR");
        self.snapshot.state = ConnectorState::Error;
        self.snapshot.error_code = Some("CONNECTOR_HEARTBEAT_TIMEOUT".to_string());
        self.publish();
    }

    fn publish(&self) {
        let _ = self.watch_tx.send(self.snapshot.clone());
    }

    fn handle_start(&mut self) -> Result<(), SupervisorError> {
        match self.snapshot.state {
            ConnectorState::Starting | ConnectorState::Running => Ok(()),
            ConnectorState::Stopping => {
                Err(SupervisorError::StartFailed("connector is stopping".to_string()))
            }
            ConnectorState::Stopped => self.spawn_now(),
            ConnectorState::Error => {
                // A manual start is the only way out of a crashloop pin; it
                // resets the restart window so the connector gets a fresh
                // budget rather than immediately re-pinning on its next crash.
                self.restart_timestamps.clear();
                self.snapshot.restart_count = 0;
                self.spawn_now()
            }
        }
    }

    fn spawn_now(&mut self) -> Result<(), SupervisorError> {
        let token = spawn::generate_admission_token();
        match spawn::spawn_child(&self.descriptor, &token, &self.connector_dir) {
            Ok(child) => {
                self.child = Some(child);
                self.snapshot.state = ConnectorState::Starting;
                self.snapshot.error_code = None;
                self.publish();
                Ok(())
            }
            Err(e) => {
                self.snapshot.state = ConnectorState::Error;
                self.snapshot.error_code = Some("CONNECTOR_START_FAILED".to_string());
                self.publish();
                Err(SupervisorError::StartFailed(e.to_string()))
            }
        }
    }

    async fn handle_stop(&mut self, grace: Duration) -> Result<ConnectorSnapshot, SupervisorError> {
        if self.snapshot.state == ConnectorState::Stopped {
            return Ok(self.snapshot.clone());
        }
        self.snapshot.state = ConnectorState::Stopping;
        self.publish();

        if let Some(mut child) = self.child.take() {
            #[cfg(unix)]
            if let Some(pid) = child.id() {
                let _ = nix::sys::signal::kill(
                    nix::unistd::Pid::from_raw(pid as i32),
                    nix::sys::signal::Signal::SIGTERM,
                );
            }
            if tokio::time::timeout(grace, child.wait()).await.is_err() {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }

        self.running_since = None;
        self.snapshot.state = ConnectorState::Stopped;
        self.snapshot.error_code = None;
        self.publish();
        Ok(self.snapshot.clone())
    }

    fn handle_heartbeat(&mut self, payload: Value) -> Result<(), SupervisorError> {
        let now = Instant::now();
        self.snapshot.last_heartbeat_at = Some(now);

        if self.snapshot.state == ConnectorState::Starting {
            self.snapshot.state = ConnectorState::Running;
            self.running_since = Some(now);
        }

        if let Some(running_since) = self.running_since {
            if now.duration_since(running_since) >= self.tuning.stable_runtime {
                self.restart_timestamps.clear();
            }
        }

        match payload.get("data_count").and_then(|v| v.as_u64()) {
            Some(n) => self.snapshot.data_counter += n,
            None => self.snapshot.data_counter += 1,
        }

        self.publish();
        Ok(())
    }

    fn handle_report_error(&mut self, code: String, message: String) {
        warn!(connector = %self.descriptor.connector_id, %code, %message, "connector reported error");
        self.snapshot.state = ConnectorState::Error;
        self.snapshot.error_code = Some(code);
        self.publish();
    }

    async fn on_child_exit(&mut self, status: std::io::Result<std::process::ExitStatus>) {
        self.child = None;
        let success = matches!(&status, Ok(s) if s.success());

        if self.snapshot.state == ConnectorState::Stopping {
            self.snapshot.state = ConnectorState::Stopped;
            self.publish();
            return;
        }

        if success {
            self.snapshot.state = ConnectorState::Stopped;
            self.publish();
            return;
        }

        self.snapshot.state = ConnectorState::Error;
        self.snapshot.error_code = Some("CONNECTOR_CRASHED".to_string());
        self.publish();
        self.maybe_restart().await;
    }

    async fn maybe_restart(&mut self) {
        if self.descriptor.restart_policy == RestartPolicy::Never {
            return;
        }

        let now = Instant::now();
        self.restart_timestamps.retain(|t| now.duration_since(*t) < self.tuning.backoff_window);

        if self.restart_timestamps.len() as u32 >= self.tuning.max_restarts {
            self.snapshot.error_code = Some("CONNECTOR_CRASHLOOP".to_string());
            self.publish();
            return;
        }

        let attempt = self.restart_timestamps.len() as u32;
        self.restart_timestamps.push_back(now);
        self.snapshot.restart_count += 1;
        self.publish();

        let backoff = self.tuning.backoff_base.saturating_mul(1 << attempt).min(self.tuning.backoff_cap);
        tokio::time::sleep(backoff).await;
        let _ = self.spawn_now();
    }
}

#[cfg(test)]
#[path = "actor_tests.rs"]
mod tests;
