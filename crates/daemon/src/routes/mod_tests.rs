// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use assistantd_core::EnvName;
use serde_json::json;

use super::*;
use crate::router::{Router, RouterBuilder};
use crate::supervisor::{ConnectorDescriptor, RestartPolicy, SupervisorTuning};

fn test_tuning() -> SupervisorTuning {
    SupervisorTuning {
        heartbeat_deadline: Duration::from_secs(5),
        start_deadline: Duration::from_millis(200),
        backoff_base: Duration::from_millis(10),
        backoff_cap: Duration::from_millis(50),
        backoff_window: Duration::from_secs(10),
        stable_runtime: Duration::from_secs(30),
        max_restarts: 3,
    }
}

async fn invoke(router: &Router, method: Method, path: &str, params: std::collections::HashMap<String, String>, body: serde_json::Value) -> serde_json::Value {
    let resolved = router.resolve(method, path).unwrap();
    let ctx = HandlerContext {
        params,
        body,
        correlation_id: "test".to_string(),
        cancel: tokio_util::sync::CancellationToken::new(),
    };
    resolved.handler.handle(ctx).await.unwrap()
}

#[tokio::test]
async fn health_reports_env_and_uptime() {
    let facade = Arc::new(ServiceFacade::new());
    let mut builder = RouterBuilder::new();
    register_core_routes(&mut builder, facade, Instant::now(), EnvName::Development).unwrap();
    let router = builder.freeze();

    let data = invoke(&router, Method::Query, "/health", Default::default(), serde_json::Value::Null).await;
    assert_eq!(data["status"], json!("ok"));
    assert_eq!(data["env"], json!("development"));
    assert!(data["uptime_ms"].as_u64().is_some());
}

#[tokio::test]
async fn version_reports_the_crate_version() {
    let facade = Arc::new(ServiceFacade::new());
    let mut builder = RouterBuilder::new();
    register_core_routes(&mut builder, facade, Instant::now(), EnvName::Development).unwrap();
    let router = builder.freeze();

    let data = invoke(&router, Method::Query, "/version", Default::default(), serde_json::Value::Null).await;
    assert_eq!(data["version"], json!(crate::env::PROTOCOL_VERSION));
}

#[tokio::test]
async fn connector_lifecycle_round_trips_through_the_facade() {
    let facade = Arc::new(ServiceFacade::new());
    let mut supervisor = Supervisor::new(std::env::temp_dir().join("routes-test-connectors"), test_tuning());
    supervisor.register(ConnectorDescriptor {
        connector_id: "fs".to_string(),
        display_name: "Filesystem".to_string(),
        executable: PathBuf::from("/bin/sh"),
        argv: vec!["-c".to_string(), "sleep 5".to_string()],
        capabilities: vec!["fs.read".to_string()],
        restart_policy: RestartPolicy::OnFailure,
    });
    facade.register(supervisor);

    let mut builder = RouterBuilder::new();
    register_core_routes(&mut builder, Arc::clone(&facade), Instant::now(), EnvName::Development).unwrap();
    let router = builder.freeze();

    let mut params = std::collections::HashMap::new();
    params.insert("id".to_string(), "fs".to_string());

    let listed = invoke(&router, Method::Lifecycle, "/connectors/list", Default::default(), serde_json::Value::Null).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["connector_id"], json!("fs"));
    assert_eq!(listed[0]["state"], json!("STOPPED"));

    let supervisor = facade.get::<Supervisor>();
    let start_fut = supervisor.start("fs");
    let heartbeat_fut = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        supervisor.heartbeat("fs", json!({})).await.unwrap();
    };
    let (start_result, _) = tokio::join!(start_fut, heartbeat_fut);
    assert!(start_result.is_ok());

    let heartbeat_result = invoke(
        &router,
        Method::Heartbeat,
        "/connectors/fs/heartbeat",
        params.clone(),
        json!({"data_count": 3}),
    )
    .await;
    assert_eq!(heartbeat_result["ack"], json!(true));

    let stopped = invoke(&router, Method::Lifecycle, "/connectors/fs/stop", params, json!({"grace_ms": 100})).await;
    assert_eq!(stopped["state"], json!("STOPPED"));
}

#[tokio::test]
async fn start_on_unknown_connector_fails_gracefully() {
    let facade = Arc::new(ServiceFacade::new());
    let supervisor = Supervisor::new(std::env::temp_dir().join("routes-test-missing"), test_tuning());
    facade.register(supervisor);

    let mut builder = RouterBuilder::new();
    register_core_routes(&mut builder, Arc::clone(&facade), Instant::now(), EnvName::Development).unwrap();
    let router = builder.freeze();

    let mut params = std::collections::HashMap::new();
    params.insert("id".to_string(), "ghost".to_string());

    let resolved = router.resolve(Method::Lifecycle, "/connectors/ghost/start").unwrap();
    let ctx = HandlerContext { params, body: serde_json::Value::Null, correlation_id: "t".to_string(), cancel: tokio_util::sync::CancellationToken::new() };
    let failure = resolved.handler.handle(ctx).await.unwrap_err();
    assert_eq!(failure.code(), ErrorCode::ConnectorNotFound);
}
