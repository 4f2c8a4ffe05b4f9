// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn method_serializes_to_exact_wire_strings() {
    assert_eq!(serde_json::to_value(Method::Query).unwrap(), json!("QUERY"));
    assert_eq!(serde_json::to_value(Method::StreamChunk).unwrap(), json!("STREAM_CHUNK"));
    assert_eq!(serde_json::to_value(Method::Lifecycle).unwrap(), json!("LIFECYCLE"));
}

#[test]
fn request_deserializes_minimal_envelope() {
    let raw = json!({
        "method": "QUERY",
        "path": "/health",
        "correlation_id": "c1",
    });
    let req: Request = serde_json::from_value(raw).unwrap();
    assert_eq!(req.method, Method::Query);
    assert_eq!(req.path, "/health");
    assert_eq!(req.body, Value::Null);
    assert!(req.params.is_empty());
    assert!(req.auth.is_none());
}

#[test]
fn request_round_trips_with_full_envelope() {
    let req = Request::new(Method::Mutate, "/connectors/fs/start", "c2")
        .with_body(json!({"grace_ms": 2000}))
        .with_token("abc123");
    let encoded = serde_json::to_string(&req).unwrap();
    let decoded: Request = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, req);
}

#[test]
fn builder_defaults_body_to_null_and_no_auth() {
    let req = Request::new(Method::Heartbeat, "/connectors/fs/heartbeat", "c3");
    assert_eq!(req.body, Value::Null);
    assert!(req.auth.is_none());
}
