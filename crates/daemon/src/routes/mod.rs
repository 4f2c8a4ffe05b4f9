// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The handful of routes the IPC layer itself owns (§6): health/version
//! introspection and the connector lifecycle surface. Everything else is a
//! business route registered by a collaborator outside this crate's scope.

use std::sync::Arc;
use std::time::{Duration, Instant};

use assistantd_core::EnvName;
use assistantd_wire::{ErrorCode, Method};
use serde_json::json;

use crate::facade::ServiceFacade;
use crate::router::{FnHandler, HandlerContext, HandlerFailure, RouteHandler, RouterBuilder, RouterError};
use crate::supervisor::{Supervisor, SupervisorError};

const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(5_000);

/// Register `/health`, `/version`, and the `/connectors/*` lifecycle
/// surface. Called once at startup before the listener ever accepts
/// traffic, per §4.5's "routes are registered before the listener accepts".
pub fn register_core_routes(
    builder: &mut RouterBuilder,
    facade: Arc<ServiceFacade>,
    start_time: Instant,
    env: EnvName,
) -> Result<(), RouterError> {
    builder.register(Method::Query, "/health", health_handler(start_time, env))?;
    builder.register(Method::Query, "/version", version_handler())?;
    builder.register(Method::Lifecycle, "/connectors/list", connectors_list_handler(Arc::clone(&facade)))?;
    builder.register(Method::Lifecycle, "/connectors/:id/start", connectors_start_handler(Arc::clone(&facade)))?;
    builder.register(Method::Lifecycle, "/connectors/:id/stop", connectors_stop_handler(Arc::clone(&facade)))?;
    builder.register(Method::Heartbeat, "/connectors/:id/heartbeat", connectors_heartbeat_handler(facade))?;
    Ok(())
}

fn health_handler(start_time: Instant, env: EnvName) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |_ctx: HandlerContext| {
        let uptime_ms = start_time.elapsed().as_millis() as u64;
        async move { Ok(json!({ "status": "ok", "uptime_ms": uptime_ms, "env": env.to_string() })) }
    }))
}

fn version_handler() -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(|_ctx: HandlerContext| async {
        Ok(json!({ "version": crate::env::PROTOCOL_VERSION }))
    }))
}

fn connector_id(ctx: &HandlerContext) -> Result<String, HandlerFailure> {
    ctx.params.get("id").cloned().ok_or_else(|| HandlerFailure::Message("missing :id path parameter".to_string()))
}

/// Maps the supervisor's internal failure taxonomy onto the wire's
/// connector-lifecycle error codes, per §7's "a synchronous lifecycle
/// failure carries its own code, not a generic HANDLER_FAILED".
fn lifecycle_failure(err: SupervisorError) -> HandlerFailure {
    let code = match &err {
        SupervisorError::NotFound(_) => ErrorCode::ConnectorNotFound,
        SupervisorError::StartTimedOut | SupervisorError::StartFailed(_) => ErrorCode::ConnectorStartFailed,
        SupervisorError::ActorGone => ErrorCode::ConnectorStateInvalid,
    };
    HandlerFailure::Coded(code, err.to_string())
}

fn connectors_list_handler(facade: Arc<ServiceFacade>) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |_ctx: HandlerContext| {
        let facade = Arc::clone(&facade);
        async move {
            let supervisor = facade.get::<Supervisor>();
            let connectors: Vec<_> = supervisor
                .list()
                .into_iter()
                .map(|(descriptor, snapshot)| {
                    json!({
                        "connector_id": descriptor.connector_id,
                        "display_name": descriptor.display_name,
                        "capabilities": descriptor.capabilities,
                        "restart_policy": descriptor.restart_policy.to_string(),
                        "state": snapshot.state.to_string(),
                        "restart_count": snapshot.restart_count,
                        "data_counter": snapshot.data_counter,
                        "error_code": snapshot.error_code,
                    })
                })
                .collect();
            Ok(json!(connectors))
        }
    }))
}

fn connectors_start_handler(facade: Arc<ServiceFacade>) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |ctx: HandlerContext| {
        let facade = Arc::clone(&facade);
        async move {
            let id = connector_id(&ctx)?;
            let supervisor = facade.get::<Supervisor>();
            let snapshot = supervisor.start(&id).await.map_err(lifecycle_failure)?;
            Ok(json!({ "connector_id": id, "state": snapshot.state.to_string() }))
        }
    }))
}

fn connectors_stop_handler(facade: Arc<ServiceFacade>) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |ctx: HandlerContext| {
        let facade = Arc::clone(&facade);
        async move {
            let id = connector_id(&ctx)?;
            let grace = ctx
                .body
                .get("grace_ms")
                .and_then(|v| v.as_u64())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_STOP_GRACE);
            let supervisor = facade.get::<Supervisor>();
            let snapshot = supervisor.stop(&id, grace).await.map_err(lifecycle_failure)?;
            Ok(json!({ "connector_id": id, "state": snapshot.state.to_string() }))
        }
    }))
}

fn connectors_heartbeat_handler(facade: Arc<ServiceFacade>) -> Arc<dyn RouteHandler> {
    Arc::new(FnHandler(move |ctx: HandlerContext| {
        let facade = Arc::clone(&facade);
        async move {
            let id = connector_id(&ctx)?;
            let supervisor = facade.get::<Supervisor>();
            supervisor.heartbeat(&id, ctx.body.clone()).await.map_err(lifecycle_failure)?;
            Ok(json!({ "ack": true }))
        }
    }))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
