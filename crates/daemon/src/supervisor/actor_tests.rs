// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{mpsc, oneshot, watch};

use super::*;

fn test_tuning() -> SupervisorTuning {
    SupervisorTuning {
        heartbeat_deadline: Duration::from_secs(5),
        start_deadline: Duration::from_secs(2),
        backoff_base: Duration::from_millis(10),
        backoff_cap: Duration::from_millis(50),
        backoff_window: Duration::from_secs(10),
        stable_runtime: Duration::from_secs(30),
        max_restarts: 3,
    }
}

fn sleepy_descriptor(id: &str) -> ConnectorDescriptor {
    ConnectorDescriptor {
        connector_id: id.to_string(),
        display_name: id.to_string(),
        executable: PathBuf::from("/bin/sh"),
        argv: vec!["-c".to_string(), "sleep 5".to_string()],
        capabilities: vec![],
        restart_policy: RestartPolicy::OnFailure,
    }
}

fn crashy_descriptor(id: &str) -> ConnectorDescriptor {
    ConnectorDescriptor {
        connector_id: id.to_string(),
        display_name: id.to_string(),
        executable: PathBuf::from("/bin/sh"),
        argv: vec!["-c".to_string(), "exit 1".to_string()],
        capabilities: vec![],
        restart_policy: RestartPolicy::OnFailure,
    }
}

fn spawn_actor(descriptor: ConnectorDescriptor, tuning: SupervisorTuning) -> (mpsc::Sender<Command>, watch::Receiver<ConnectorSnapshot>) {
    let (tx, rx) = mpsc::channel(32);
    let (watch_tx, watch_rx) = watch::channel(ConnectorSnapshot::initial());
    let dir = std::env::temp_dir().join(format!("actor-test-{}", descriptor.connector_id));
    let actor = ConnectorActor::new(descriptor, dir, tuning, tx.clone(), rx, watch_tx);
    tokio::spawn(actor.run());
    (tx, watch_rx)
}

#[tokio::test]
async fn start_then_heartbeat_reaches_running() {
    let (tx, mut watch) = spawn_actor(sleepy_descriptor("sleepy-a"), test_tuning());

    let (resp_tx, resp_rx) = oneshot::channel();
    tx.send(Command::Start { respond: resp_tx }).await.unwrap();
    resp_rx.await.unwrap().unwrap();

    assert_eq!(watch.borrow().state, ConnectorState::Starting);

    let (hb_tx, hb_rx) = oneshot::channel();
    tx.send(Command::Heartbeat { payload: json!({}), respond: hb_tx }).await.unwrap();
    hb_rx.await.unwrap().unwrap();
    watch.changed().await.ok();

    assert_eq!(watch.borrow().state, ConnectorState::Running);
}

#[tokio::test]
async fn stop_kills_running_child_and_settles_stopped() {
    let (tx, watch) = spawn_actor(sleepy_descriptor("sleepy-b"), test_tuning());

    let (resp_tx, resp_rx) = oneshot::channel();
    tx.send(Command::Start { respond: resp_tx }).await.unwrap();
    resp_rx.await.unwrap().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel();
    tx.send(Command::Stop { grace: Duration::from_millis(100), respond: stop_tx }).await.unwrap();
    let snapshot = stop_rx.await.unwrap().unwrap();

    assert_eq!(snapshot.state, ConnectorState::Stopped);
    assert_eq!(watch.borrow().state, ConnectorState::Stopped);
}

#[tokio::test]
async fn crash_triggers_backoff_restart() {
    let (tx, mut watch) = spawn_actor(crashy_descriptor("crashy-a"), test_tuning());

    let (resp_tx, resp_rx) = oneshot::channel();
    tx.send(Command::Start { respond: resp_tx }).await.unwrap();
    resp_rx.await.unwrap().unwrap();

    let mut saw_error = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if watch.borrow().state == ConnectorState::Error {
            saw_error = true;
        }
        if saw_error && watch.borrow().restart_count > 0 {
            break;
        }
        if tokio::time::timeout_at(deadline, watch.changed()).await.is_err() {
            break;
        }
    }

    assert!(saw_error, "expected the actor to observe the crash as an Error state");
    assert!(watch.borrow().restart_count >= 1, "expected at least one restart attempt");
}

#[tokio::test]
async fn report_error_forces_error_state() {
    let (tx, watch) = spawn_actor(sleepy_descriptor("sleepy-c"), test_tuning());

    let (resp_tx, resp_rx) = oneshot::channel();
    tx.send(Command::Start { respond: resp_tx }).await.unwrap();
    resp_rx.await.unwrap().unwrap();

    let (err_tx, err_rx) = oneshot::channel();
    tx.send(Command::ReportError {
        code: "UPSTREAM_AUTH_FAILED".to_string(),
        message: "token rejected".to_string(),
        respond: err_tx,
    })
    .await
    .unwrap();
    err_rx.await.unwrap();

    let snapshot = watch.borrow().clone();
    assert_eq!(snapshot.state, ConnectorState::Error);
    assert_eq!(snapshot.error_code.as_deref(), Some("UPSTREAM_AUTH_FAILED"));
}

#[tokio::test]
async fn missed_heartbeat_deadline_transitions_to_error() {
    let tuning = SupervisorTuning { heartbeat_deadline: Duration::from_millis(50), ..test_tuning() };
    let (tx, mut watch) = spawn_actor(sleepy_descriptor("sleepy-d"), tuning);

    let (resp_tx, resp_rx) = oneshot::channel();
    tx.send(Command::Start { respond: resp_tx }).await.unwrap();
    resp_rx.await.unwrap().unwrap();

    let (hb_tx, hb_rx) = oneshot::channel();
    tx.send(Command::Heartbeat { payload: json!({}), respond: hb_tx }).await.unwrap();
    hb_rx.await.unwrap().unwrap();
    watch.changed().await.ok();
    assert_eq!(watch.borrow().state, ConnectorState::Running);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if watch.borrow().state == ConnectorState::Error {
            break;
        }
        if tokio::time::timeout_at(deadline, watch.changed()).await.is_err() {
            panic!("expected a missed heartbeat to drive the connector to ERROR");
        }
    }
    assert_eq!(watch.borrow().error_code.as_deref(), Some("CONNECTOR_HEARTBEAT_TIMEOUT"));
}

#[tokio::test]
async fn manual_start_resets_crashloop_counters() {
    let tuning = SupervisorTuning { max_restarts: 1, ..test_tuning() };
    let (tx, mut watch) = spawn_actor(crashy_descriptor("crashy-b"), tuning);

    let (resp_tx, resp_rx) = oneshot::channel();
    tx.send(Command::Start { respond: resp_tx }).await.unwrap();
    resp_rx.await.unwrap().unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if watch.borrow().error_code.as_deref() == Some("CONNECTOR_CRASHLOOP") {
            break;
        }
        if tokio::time::timeout_at(deadline, watch.changed()).await.is_err() {
            panic!("expected the connector to pin CONNECTOR_CRASHLOOP");
        }
    }
    assert!(watch.borrow().restart_count >= 1);

    let (resp_tx2, resp_rx2) = oneshot::channel();
    tx.send(Command::Start { respond: resp_tx2 }).await.unwrap();
    resp_rx2.await.unwrap().unwrap();

    tokio::time::timeout(Duration::from_secs(2), watch.changed()).await.unwrap().unwrap();
    let snapshot = watch.borrow().clone();
    assert_eq!(snapshot.state, ConnectorState::Starting);
    assert_eq!(snapshot.restart_count, 0, "manual start should reset the restart counter");
    assert_eq!(snapshot.error_code, None);
}
