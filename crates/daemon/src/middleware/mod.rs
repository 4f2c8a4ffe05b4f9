// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ordered middleware pipeline: trace/log, peer auth, rate limit,
//! validation, error translation. One [`Pipeline`] instance is owned per
//! connection so rate-limit buckets and the error dedupe window are
//! naturally scoped per spec.md §5's "Rate-limit buckets are sharded by
//! connection" rule.

mod error_translation;
mod rate_limit;

pub use error_translation::ErrorTranslator;
pub use rate_limit::RateLimiter;

use std::sync::Arc;
use std::time::Instant;

use assistantd_core::TraceId;
use assistantd_wire::{ErrorCode, Request, Response};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::router::{HandlerContext, HandlerFailure, RouteError, RouteHandler, Router};

/// The result of [`Pipeline::prepare`]: either an early response
/// (auth/routing/rate-limit/validation rejected the request before a
/// handler was ever chosen) or a resolved handler plus the context it
/// should run with, outside the lock.
pub enum Dispatched {
    Early(Response),
    Ready(ReadyRequest),
}

/// A resolved handler and the context to run it with. The caller awaits
/// `handler.handle(ctx)` itself, outside the pipeline lock, then hands
/// `meta` (not `self`) back to [`Pipeline::finish`] alongside the outcome.
pub struct ReadyRequest {
    pub handler: Arc<dyn RouteHandler>,
    pub ctx: HandlerContext,
    pub meta: ReadyMeta,
}

/// What [`Pipeline::finish`] needs to translate a handler's outcome into a
/// wire response: everything about the request except the handler and its
/// context, which the caller already consumed to run the handler.
pub struct ReadyMeta {
    trace_id: TraceId,
    correlation_id: String,
    pattern: String,
    started_at: Instant,
}

/// What happened to the handler once it was awaited outside the lock.
pub enum HandlerOutcome {
    Completed(Result<Value, HandlerFailure>),
    TimedOut,
}

pub struct Pipeline {
    rate_limiter: RateLimiter,
    translator: ErrorTranslator,
    /// The daemon's own effective uid; `None` on platforms without a peer
    /// credential facility, in which case peer auth is skipped entirely.
    own_uid: Option<u32>,
    session_token: Option<String>,
}

impl Pipeline {
    pub fn new(own_uid: Option<u32>, session_token: Option<String>, dedupe_window: std::time::Duration) -> Self {
        Self {
            rate_limiter: RateLimiter::new(64.0, 32.0),
            translator: ErrorTranslator::new(dedupe_window),
            own_uid,
            session_token,
        }
    }

    /// Runs trace/log, peer auth, routing, rate limiting, and validation —
    /// every middleware step that only touches this pipeline's own state and
    /// never suspends on a handler. Call under the connection's pipeline
    /// lock; release the lock before awaiting whatever `Dispatched::Ready`
    /// resolves to, so one slow handler never blocks a later request on the
    /// same connection (§4.4's no-head-of-line-blocking rule).
    pub fn prepare(&mut self, router: &Router, request: Request, peer_uid: Option<u32>, cancel: CancellationToken) -> Dispatched {
        let trace_id = TraceId::new();
        let now = Instant::now();

        if matches!(request.method, assistantd_wire::Method::Query) {
            debug!(%trace_id, method = %request.method, path = %request.path, "received query");
        } else {
            info!(%trace_id, method = %request.method, path = %request.path, "received request");
        }

        if let Err(code) = self.authenticate(&request, peer_uid) {
            let envelope = self.translator.translate(code, &request.path, "peer authentication failed", now);
            return Dispatched::Early(Response::error(request.correlation_id, trace_id, envelope));
        }

        let resolved = match router.resolve(request.method, &request.path) {
            Ok(resolved) => resolved,
            Err(RouteError::NotFound) => {
                let envelope = self.translator.translate(ErrorCode::NotFound, &request.path, "no matching route", now);
                return Dispatched::Early(Response::error(request.correlation_id, trace_id, envelope));
            }
            Err(RouteError::MethodNotAllowed) => {
                let envelope = self.translator.translate(
                    ErrorCode::MethodNotAllowed,
                    &request.path,
                    "method not registered for this path",
                    now,
                );
                return Dispatched::Early(Response::error(request.correlation_id, trace_id, envelope));
            }
        };

        if let Err(retry_after) = self.rate_limiter.check(&resolved.pattern, now) {
            let envelope = self
                .translator
                .translate(ErrorCode::RateLimited, &resolved.pattern, "token bucket exhausted", now)
                .with_retry_after(retry_after.as_millis() as u64);
            return Dispatched::Early(Response::error(request.correlation_id, trace_id, envelope));
        }

        if request.correlation_id.trim().is_empty() {
            let envelope =
                self.translator.translate(ErrorCode::ValidationFailed, &resolved.pattern, "empty correlation_id", now);
            return Dispatched::Early(Response::error(request.correlation_id, trace_id, envelope));
        }

        let ctx = HandlerContext {
            params: resolved.params,
            body: request.body,
            correlation_id: request.correlation_id.clone(),
            cancel,
        };

        Dispatched::Ready(ReadyRequest {
            handler: resolved.handler,
            ctx,
            meta: ReadyMeta {
                trace_id,
                correlation_id: request.correlation_id,
                pattern: resolved.pattern,
                started_at: now,
            },
        })
    }

    /// Turns a handler's outcome, produced outside the lock, into a wire
    /// response. Call under the connection's pipeline lock: error
    /// translation shares the dedupe window with the rest of the pipeline.
    pub fn finish(&mut self, meta: ReadyMeta, outcome: HandlerOutcome) -> Response {
        match outcome {
            HandlerOutcome::Completed(Ok(data)) => Response::ok(meta.correlation_id, meta.trace_id, data),
            HandlerOutcome::Completed(Err(failure)) => {
                let envelope =
                    self.translator.translate(failure.code(), &meta.pattern, &failure.to_string(), meta.started_at);
                Response::error(meta.correlation_id, meta.trace_id, envelope)
            }
            HandlerOutcome::TimedOut => {
                let envelope = self.translator.translate(
                    ErrorCode::Timeout,
                    &meta.pattern,
                    "handler exceeded the per-route deadline",
                    meta.started_at,
                );
                Response::error(meta.correlation_id, meta.trace_id, envelope)
            }
        }
    }

    fn authenticate(&self, request: &Request, peer_uid: Option<u32>) -> Result<(), ErrorCode> {
        if let (Some(own), Some(peer)) = (self.own_uid, peer_uid) {
            if own != peer {
                return Err(ErrorCode::AuthDenied);
            }
        }
        if let Some(expected) = &self.session_token {
            let provided = request.auth.as_ref().and_then(|a| a.token.as_deref());
            if provided != Some(expected.as_str()) {
                return Err(ErrorCode::AuthDenied);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
