// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn read_parses_all_three_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.endpoint");
    std::fs::write(&path, "transport=unix\naddress=/tmp/example/daemon.sock\npid=4242\n").unwrap();

    let endpoint = Endpoint::read(&path).unwrap();
    assert_eq!(endpoint.transport, "unix");
    assert_eq!(endpoint.address, "/tmp/example/daemon.sock");
    assert_eq!(endpoint.pid, 4242);
}

#[test]
fn read_ignores_unknown_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.endpoint");
    std::fs::write(&path, "transport=unix\nfuture_field=whatever\naddress=/tmp/x.sock\npid=1\n").unwrap();

    let endpoint = Endpoint::read(&path).unwrap();
    assert_eq!(endpoint.transport, "unix");
    assert_eq!(endpoint.pid, 1);
}

#[test]
fn read_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.endpoint");

    let err = Endpoint::read(&path).unwrap_err();
    assert!(matches!(err, DiscoveryError::NotFound(p) if p == path));
}

#[test]
fn read_missing_field_is_reported_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.endpoint");
    std::fs::write(&path, "transport=unix\npid=1\n").unwrap();

    let err = Endpoint::read(&path).unwrap_err();
    assert!(matches!(err, DiscoveryError::MissingField(_, "address")));
}

#[test]
fn read_unparseable_pid_is_treated_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.endpoint");
    std::fs::write(&path, "transport=unix\naddress=/tmp/x.sock\npid=not-a-number\n").unwrap();

    let err = Endpoint::read(&path).unwrap_err();
    assert!(matches!(err, DiscoveryError::MissingField(_, "pid")));
}
