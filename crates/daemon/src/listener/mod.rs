// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accept loop and per-connection handling: decode, dispatch through the
//! middleware pipeline, write the response. One task per connection, one
//! additional task per inflight request up to the connection's inflight
//! cap, and a single writer task per connection so frame writes are never
//! interleaved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use assistantd_core::TraceId;
use assistantd_wire::{
    self as wire, ErrorCode, ErrorEnvelope, Method, ProtocolError, ReassemblyError, Request,
    Response, StreamAssembler,
};
use tokio::net::{UnixListener, UnixStream};
use thiserror::Error;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::middleware::{Dispatched, HandlerOutcome, Pipeline, ReadyRequest};
use crate::router::Router;

/// Shared, read-only context every connection task borrows from.
pub struct ListenCtx {
    pub router: Arc<Router>,
    pub own_uid: Option<u32>,
    pub session_token: Option<String>,
    pub dedupe_window: Duration,
    pub ipc_timeout: Duration,
    /// Outer deadline a single route handler may run for; expiry yields
    /// `TIMEOUT` independent of the frame-level `ipc_timeout`.
    pub route_deadline: Duration,
    pub inflight_cap: usize,
    pub write_stall_deadline: Duration,
    pub shutdown: CancellationToken,
    pub start_time: Instant,
}

pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Accept connections until the shared shutdown token fires. Accept
    /// errors are logged and do not end the loop; only an explicit
    /// shutdown does.
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.ctx.shutdown.cancelled() => {
                    info!("listener shutting down");
                    return;
                }
                result = self.unix.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let ctx = Arc::clone(&self.ctx);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, &ctx).await {
                                    log_connection_error(e);
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(ProtocolError::ConnectionClosed) => debug!("client disconnected"),
        ConnectionError::Protocol(ProtocolError::Timeout) => warn!("connection timed out waiting for a frame"),
        other => error!(error = %other, "connection error"),
    }
}

/// Read peer credentials on the accepted socket, if the platform exposes
/// them. `None` disables peer authentication entirely rather than failing
/// open or closed by guesswork.
#[cfg(target_os = "linux")]
fn peer_uid(stream: &UnixStream) -> Option<u32> {
    nix::sys::socket::getsockopt(stream, nix::sys::socket::sockopt::PeerCredentials)
        .ok()
        .map(|cred| cred.uid())
}

#[cfg(not(target_os = "linux"))]
fn peer_uid(_stream: &UnixStream) -> Option<u32> {
    None
}

/// Drive one client connection: a read loop that decodes frames and spawns
/// one dispatch task per request (bounded by the connection's inflight
/// cap), and a single writer task that owns the socket's write half so
/// responses, however many requests are concurrently in flight, are never
/// interleaved on the wire.
async fn handle_connection(stream: UnixStream, ctx: &ListenCtx) -> Result<(), ConnectionError> {
    let peer = peer_uid(&stream);
    let (mut reader, mut writer) = stream.into_split();

    let (write_tx, mut write_rx) = mpsc::channel::<Response>(ctx.inflight_cap.max(1));
    let write_stall_deadline = ctx.write_stall_deadline;
    let ipc_timeout = ctx.ipc_timeout;
    let writer_task = tokio::spawn(async move {
        while let Some(response) = write_rx.recv().await {
            if let Err(e) = wire::write_response(&mut writer, &response, ipc_timeout).await {
                warn!(error = %e, "failed to write response, closing connection");
                break;
            }
        }
    });

    let conn_cancel = CancellationToken::new();
    let pipeline = Arc::new(tokio::sync::Mutex::new(Pipeline::new(ctx.own_uid, ctx.session_token.clone(), ctx.dedupe_window)));
    let inflight = Arc::new(AtomicUsize::new(0));
    let mut inflight_tasks = JoinSet::new();
    let mut assembler = StreamAssembler::new();

    let result = loop {
        let mut request = match wire::read_request(&mut reader, ctx.ipc_timeout).await {
            Ok(request) => request,
            Err(e) => {
                if let Some(code) = decode_error_code(&e) {
                    let envelope = ErrorEnvelope::new(code);
                    let response = Response::error(String::new(), TraceId::new(), envelope);
                    let _ = send_with_stall_guard(&write_tx, response, write_stall_deadline).await;
                }
                break Err(ConnectionError::Protocol(e));
            }
        };

        if request.method == Method::StreamChunk {
            match reassemble_chunk(&mut assembler, &request) {
                Ok(None) => {
                    let response = Response::ok(request.correlation_id, TraceId::new(), json!({"received": true}));
                    if send_with_stall_guard(&write_tx, response, write_stall_deadline).await.is_err() {
                        break Ok(());
                    }
                    continue;
                }
                Ok(Some(inner)) => request = inner,
                Err(code) => {
                    let envelope = ErrorEnvelope::new(code);
                    let response = Response::error(request.correlation_id, TraceId::new(), envelope);
                    if send_with_stall_guard(&write_tx, response, write_stall_deadline).await.is_err() {
                        break Ok(());
                    }
                    continue;
                }
            }
        }

        if inflight.load(Ordering::Acquire) >= ctx.inflight_cap {
            let envelope = ErrorEnvelope::new(ErrorCode::RateLimitConnectionSaturated);
            let response = Response::error(request.correlation_id, TraceId::new(), envelope);
            if send_with_stall_guard(&write_tx, response, write_stall_deadline).await.is_err() {
                break Ok(());
            }
            continue;
        }

        inflight.fetch_add(1, Ordering::AcqRel);
        let pipeline = Arc::clone(&pipeline);
        let router = Arc::clone(&ctx.router);
        let write_tx = write_tx.clone();
        let inflight = Arc::clone(&inflight);
        let cancel = conn_cancel.child_token();
        let route_deadline = ctx.route_deadline;

        inflight_tasks.spawn(async move {
            let dispatched = pipeline.lock().await.prepare(&router, request, peer, cancel.clone());

            let response = match dispatched {
                Dispatched::Early(response) => response,
                Dispatched::Ready(ready) => {
                    let ReadyRequest { handler, ctx, meta } = ready;
                    // The handler runs with the pipeline lock released, so a
                    // slow request never blocks a faster one queued behind it
                    // on the same connection.
                    let outcome = tokio::select! {
                        result = handler.handle(ctx) => HandlerOutcome::Completed(result),
                        () = tokio::time::sleep(route_deadline) => {
                            cancel.cancel();
                            HandlerOutcome::TimedOut
                        }
                    };
                    pipeline.lock().await.finish(meta, outcome)
                }
            };

            inflight.fetch_sub(1, Ordering::AcqRel);
            let _ = send_with_stall_guard(&write_tx, response, write_stall_deadline).await;
        });
    };

    conn_cancel.cancel();
    inflight_tasks.shutdown().await;
    drop(write_tx);
    writer_task.abort();

    result
}

/// Feed one `STREAM_CHUNK` request into the connection's assembler. `Ok(None)`
/// means more chunks are expected (caller should ack and keep reading);
/// `Ok(Some(request))` means reassembly just completed and the embedded
/// request is ready for ordinary dispatch, as if it had arrived in one frame.
fn reassemble_chunk(assembler: &mut StreamAssembler, request: &Request) -> Result<Option<Request>, ErrorCode> {
    let chunk: wire::StreamChunk = serde_json::from_value(request.body.clone()).map_err(|_| ErrorCode::FrameMalformed)?;
    match assembler.insert(chunk, Instant::now()) {
        Ok(None) => Ok(None),
        Ok(Some(bytes)) => wire::decode::<Request>(&bytes).map(Some).map_err(|_| ErrorCode::ProtocolInvalid),
        Err(e) => {
            warn!(error = %e, "stream chunk reassembly failed");
            Err(reassembly_error_code(&e))
        }
    }
}

fn reassembly_error_code(e: &ReassemblyError) -> ErrorCode {
    match e {
        ReassemblyError::SizeExceeded(_) => ErrorCode::FrameTooLarge,
        ReassemblyError::DeadlineExceeded(_) => ErrorCode::Timeout,
        _ => ErrorCode::ProtocolInvalid,
    }
}

/// Map a frame-decode failure to the wire error code reported back to the
/// peer before the connection closes. `read_request`'s timeout and the
/// ordinary EOF/IO paths get no response: there is either no peer left to
/// write to, or nothing useful yet decoded to react to.
fn decode_error_code(e: &ProtocolError) -> Option<ErrorCode> {
    match e {
        ProtocolError::FrameTooLarge => Some(ErrorCode::FrameTooLarge),
        ProtocolError::FrameTruncated => Some(ErrorCode::FrameTruncated),
        ProtocolError::FrameMalformed(_) => Some(ErrorCode::FrameMalformed),
        ProtocolError::Timeout | ProtocolError::ConnectionClosed | ProtocolError::Io(_) => None,
    }
}

/// Push a response onto the writer queue, treating a queue that stays full
/// past `deadline` as a dead connection per §4.4's backpressure rule.
async fn send_with_stall_guard(
    tx: &mpsc::Sender<Response>,
    response: Response,
    deadline: Duration,
) -> Result<(), ()> {
    match tokio::time::timeout(deadline, tx.send(response)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(()),
        Err(_) => {
            warn!("writer queue stalled past the deadline, tearing down connection");
            Err(())
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
