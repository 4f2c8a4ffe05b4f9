// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connects to a running daemon as a native connector process: discovery,
//! connect, send/receive, and reconnect-with-backoff. Generalized from the
//! teacher CLI's `DaemonClient` connect/hello/status pattern into a
//! reusable client any connector binary links against.

use std::path::{Path, PathBuf};
use std::time::Duration;

use assistantd_wire::{self as wire, Method, ProtocolError, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::warn;

use crate::discovery::{DiscoveryError, Endpoint};

const DEFAULT_IPC_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_BASE: Duration = Duration::from_millis(250);
const RECONNECT_CAP: Duration = Duration::from_secs(10);
const RECONNECT_MAX_ATTEMPTS: u32 = 8;
const CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("endpoint discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("unsupported transport {0:?}; this client only speaks unix domain sockets")]
    UnsupportedTransport(String),
    #[error("reconnect exhausted after {0} attempts")]
    ReconnectExhausted(u32),
    #[error("response correlation_id {got:?} did not match request {expected:?}")]
    CorrelationMismatch { expected: String, got: String },
}

/// One connector's live connection to the daemon. Not `Clone`/`Sync`: a
/// connector process owns exactly one of these and drives it from a single
/// task, matching the one-request-in-flight-at-a-time shape of a native
/// worker talking to its supervisor.
pub struct ConnectorClient {
    endpoint_path: PathBuf,
    connector_id: String,
    admission_token: String,
    stream: UnixStream,
    next_id: u64,
}

impl ConnectorClient {
    /// Read the descriptor, connect, and send the first `Hello` — a
    /// heartbeat on this connector's own route carrying the one-time
    /// admission token — to establish trust before any other traffic.
    pub async fn connect(
        endpoint_path: PathBuf,
        connector_id: impl Into<String>,
        admission_token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let connector_id = connector_id.into();
        let admission_token = admission_token.into();
        let stream = Self::dial(&endpoint_path).await?;

        let mut client = Self { endpoint_path, connector_id, admission_token, stream, next_id: 0 };
        client.hello().await?;
        Ok(client)
    }

    async fn dial(endpoint_path: &Path) -> Result<UnixStream, ClientError> {
        let endpoint = Endpoint::read(endpoint_path)?;
        if endpoint.transport != "unix" {
            return Err(ClientError::UnsupportedTransport(endpoint.transport));
        }
        let stream = UnixStream::connect(&endpoint.address).await.map_err(ProtocolError::Io)?;
        Ok(stream)
    }

    fn next_correlation_id(&mut self) -> String {
        self.next_id += 1;
        format!("{}-{}", self.connector_id, self.next_id)
    }

    fn heartbeat_path(&self) -> String {
        format!("/connectors/{}/heartbeat", self.connector_id)
    }

    async fn hello(&mut self) -> Result<Response, ClientError> {
        let correlation_id = self.next_correlation_id();
        let request = Request::new(Method::Heartbeat, self.heartbeat_path(), correlation_id)
            .with_body(serde_json::json!({}))
            .with_token(self.admission_token.clone());
        self.send(request).await
    }

    /// Send one request and return its matching response, transparently
    /// chunking the outbound body across `STREAM_CHUNK` frames when it
    /// would exceed `MAX_FRAME` on the wire.
    pub async fn send(&mut self, request: Request) -> Result<Response, ClientError> {
        let correlation_id = request.correlation_id.clone();
        let body = wire::encode(&request)?;

        if body.len() as u64 <= wire::MAX_FRAME as u64 {
            wire::write_message(&mut self.stream, &body).await?;
        } else {
            self.send_chunked(&correlation_id, &body).await?;
        }

        let response_body = wire::read_message(&mut self.stream).await?;
        let response: Response = wire::decode(&response_body)?;
        if response.correlation_id != correlation_id {
            return Err(ClientError::CorrelationMismatch {
                expected: correlation_id,
                got: response.correlation_id,
            });
        }
        Ok(response)
    }

    /// Split an oversized request body into `STREAM_CHUNK` frames sharing
    /// `correlation_id` as the reassembly session id. Interim chunks get an
    /// ack from the daemon's assembler, which is drained and discarded; the
    /// final chunk's response is the real business response, handled by the
    /// caller in `send`.
    async fn send_chunked(&mut self, correlation_id: &str, body: &[u8]) -> Result<(), ClientError> {
        let chunks = wire::split_into_chunks(correlation_id, body, CHUNK_SIZE);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let chunk_body = serde_json::to_value(&chunk)
                .map_err(|e| ProtocolError::FrameMalformed(e.to_string()))?;
            let chunk_request = Request::new(Method::StreamChunk, "/stream/chunk", correlation_id).with_body(chunk_body);
            let frame = wire::encode(&chunk_request)?;
            wire::write_message(&mut self.stream, &frame).await?;
            if i != last {
                let ack_body = wire::read_message(&mut self.stream).await?;
                let _ack: Response = wire::decode(&ack_body)?;
            }
        }
        Ok(())
    }

    /// Send a heartbeat with an arbitrary payload to this connector's own
    /// route, returning the decoded response.
    pub async fn heartbeat(&mut self, payload: serde_json::Value) -> Result<Response, ClientError> {
        let correlation_id = self.next_correlation_id();
        let request = Request::new(Method::Heartbeat, self.heartbeat_path(), correlation_id).with_body(payload);
        self.send(request).await
    }

    /// Reconnect after a lost connection: re-reads the descriptor file (the
    /// daemon may have restarted with a new socket path) and retries with
    /// bounded exponential backoff, re-sending `Hello` once connected.
    pub async fn reconnect(&mut self) -> Result<(), ClientError> {
        let mut delay = RECONNECT_BASE;
        for attempt in 1..=RECONNECT_MAX_ATTEMPTS {
            match Self::dial(&self.endpoint_path).await {
                Ok(stream) => {
                    self.stream = stream;
                    self.hello().await?;
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "reconnect attempt failed");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(RECONNECT_CAP);
                }
            }
        }
        Err(ClientError::ReconnectExhausted(RECONNECT_MAX_ATTEMPTS))
    }
}

/// Default per-request timeout a connector binary may apply with
/// `tokio::time::timeout` around a `send`/`heartbeat` call; this client
/// does not wrap its own calls in a timeout so the caller controls
/// cancellation semantics against its own event loop.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = DEFAULT_IPC_TIMEOUT;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
