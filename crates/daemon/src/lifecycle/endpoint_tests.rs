// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn publish_writes_three_line_descriptor_with_owner_only_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.endpoint");
    let mut publisher = EndpointPublisher::new(path.clone());

    publisher.publish("unix", "/tmp/example/daemon.sock").unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("transport=unix"));
    assert_eq!(lines.next(), Some("address=/tmp/example/daemon.sock"));
    assert_eq!(lines.next(), Some(format!("pid={}", std::process::id())).as_deref());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}

#[test]
fn remove_deletes_published_file_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.endpoint");
    let mut publisher = EndpointPublisher::new(path.clone());
    publisher.publish("unix", "/tmp/x.sock").unwrap();
    assert!(path.exists());

    publisher.remove();
    assert!(!path.exists());

    publisher.remove();
}

#[test]
fn check_stale_allows_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.endpoint");
    assert!(EndpointPublisher::check_stale(&path).is_ok());
}

#[test]
fn check_stale_removes_descriptor_for_dead_pid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.endpoint");
    std::fs::write(&path, "transport=unix\naddress=/tmp/x.sock\npid=999999\n").unwrap();

    assert!(EndpointPublisher::check_stale(&path).is_ok());
    assert!(!path.exists());
}

#[test]
fn check_stale_rejects_descriptor_for_live_pid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.endpoint");
    let my_pid = std::process::id();
    std::fs::write(&path, format!("transport=unix\naddress=/tmp/x.sock\npid={my_pid}\n")).unwrap();

    let err = EndpointPublisher::check_stale(&path).unwrap_err();
    assert!(matches!(err, LifecycleError::EndpointConflict(_, pid) if pid == my_pid));
    assert!(path.exists());
}
