// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use assistantd_wire::{self as wire, Method, Response, Status};
use tokio::net::UnixListener;

use super::*;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn write_endpoint(dir: &std::path::Path, socket_path: &std::path::Path) -> std::path::PathBuf {
    let endpoint_path = dir.join("daemon.endpoint");
    std::fs::write(
        &endpoint_path,
        format!("transport=unix\naddress={}\npid={}\n", socket_path.display(), std::process::id()),
    )
    .unwrap();
    endpoint_path
}

#[tokio::test]
async fn connect_performs_a_hello_heartbeat_carrying_the_admission_token() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    let endpoint_path = write_endpoint(dir.path(), &socket_path);

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = wire::read_request(&mut stream, TEST_TIMEOUT).await.unwrap();
        assert_eq!(request.method, Method::Heartbeat);
        assert_eq!(request.path, "/connectors/mic-worker/heartbeat");
        assert_eq!(request.auth.as_ref().and_then(|a| a.token.clone()), Some("tok-123".to_string()));

        let response = Response::ok(request.correlation_id, assistantd_core::TraceId::new(), serde_json::json!({}));
        wire::write_response(&mut stream, &response, TEST_TIMEOUT).await.unwrap();
    });

    let client = ConnectorClient::connect(endpoint_path, "mic-worker", "tok-123").await.unwrap();
    drop(client);
    server.await.unwrap();
}

#[tokio::test]
async fn connect_fails_when_no_endpoint_descriptor_exists() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("daemon.endpoint");

    let err = ConnectorClient::connect(missing, "mic-worker", "tok-123").await.unwrap_err();
    assert!(matches!(err, ClientError::Discovery(DiscoveryError::NotFound(_))));
}

#[tokio::test]
async fn send_round_trips_a_small_request() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    let endpoint_path = write_endpoint(dir.path(), &socket_path);

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        // hello
        let hello = wire::read_request(&mut stream, TEST_TIMEOUT).await.unwrap();
        let response = Response::ok(hello.correlation_id, assistantd_core::TraceId::new(), serde_json::json!({}));
        wire::write_response(&mut stream, &response, TEST_TIMEOUT).await.unwrap();

        // heartbeat with payload
        let request = wire::read_request(&mut stream, TEST_TIMEOUT).await.unwrap();
        assert_eq!(request.body, serde_json::json!({"temp_c": 41.2}));
        let response = Response::ok(
            request.correlation_id,
            assistantd_core::TraceId::new(),
            serde_json::json!({"acked": true}),
        );
        wire::write_response(&mut stream, &response, TEST_TIMEOUT).await.unwrap();
    });

    let mut client = ConnectorClient::connect(endpoint_path, "mic-worker", "tok-123").await.unwrap();
    let response = client.heartbeat(serde_json::json!({"temp_c": 41.2})).await.unwrap();
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.data, Some(serde_json::json!({"acked": true})));

    server.await.unwrap();
}

#[tokio::test]
async fn send_rejects_a_mismatched_correlation_id() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    let endpoint_path = write_endpoint(dir.path(), &socket_path);

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let hello = wire::read_request(&mut stream, TEST_TIMEOUT).await.unwrap();
        let response = Response::ok(hello.correlation_id, assistantd_core::TraceId::new(), serde_json::json!({}));
        wire::write_response(&mut stream, &response, TEST_TIMEOUT).await.unwrap();

        let _request = wire::read_request(&mut stream, TEST_TIMEOUT).await.unwrap();
        let response = Response::ok("not-the-right-id".to_string(), assistantd_core::TraceId::new(), serde_json::json!({}));
        wire::write_response(&mut stream, &response, TEST_TIMEOUT).await.unwrap();
    });

    let mut client = ConnectorClient::connect(endpoint_path, "mic-worker", "tok-123").await.unwrap();
    let err = client.heartbeat(serde_json::json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::CorrelationMismatch { .. }));

    server.await.unwrap();
}

#[tokio::test]
async fn send_chunks_an_oversize_body_and_drains_interim_acks() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    let endpoint_path = write_endpoint(dir.path(), &socket_path);

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let hello = wire::read_request(&mut stream, TEST_TIMEOUT).await.unwrap();
        let response = Response::ok(hello.correlation_id, assistantd_core::TraceId::new(), serde_json::json!({}));
        wire::write_response(&mut stream, &response, TEST_TIMEOUT).await.unwrap();

        let mut assembler = assistantd_wire::StreamAssembler::new();
        loop {
            let request = wire::read_request(&mut stream, TEST_TIMEOUT).await.unwrap();
            assert_eq!(request.method, Method::StreamChunk);
            let chunk: assistantd_wire::StreamChunk = serde_json::from_value(request.body.clone()).unwrap();
            match assembler.insert(chunk, std::time::Instant::now()).unwrap() {
                None => {
                    let ack = Response::ok(request.correlation_id, assistantd_core::TraceId::new(), serde_json::json!({}));
                    wire::write_response(&mut stream, &ack, TEST_TIMEOUT).await.unwrap();
                }
                Some(bytes) => {
                    let inner: assistantd_wire::Request = wire::decode(&bytes).unwrap();
                    assert_eq!(inner.path, "/store/blob");
                    assert_eq!(inner.body.get("payload"), Some(&serde_json::json!("x")));
                    let response = Response::ok(
                        request.correlation_id,
                        assistantd_core::TraceId::new(),
                        serde_json::json!({"stored": true}),
                    );
                    wire::write_response(&mut stream, &response, TEST_TIMEOUT).await.unwrap();
                    break;
                }
            }
        }
    });

    let mut client = ConnectorClient::connect(endpoint_path, "mic-worker", "tok-123").await.unwrap();

    let big_body_request = assistantd_wire::Request::new(Method::Mutate, "/store/blob", "blob-1")
        .with_body(serde_json::json!({"payload": "x", "filler": "x".repeat(wire::MAX_FRAME + 4096)}));

    let response = client.send(big_body_request).await.unwrap();
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.data, Some(serde_json::json!({"stored": true})));

    server.await.unwrap();
}
