// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The stable error taxonomy surfaced on the wire, and the safe envelope that
//! carries it. Codes are stable strings, not Rust type names, because they
//! are a cross-language contract with every client.

use assistantd_core::ErrorId;
use serde::{Deserialize, Serialize};

/// Stable error codes. `Display`/`Serialize` both render the exact wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Protocol
    ProtocolInvalid,
    FrameTooLarge,
    FrameTruncated,
    FrameMalformed,
    // Dispatch
    NotFound,
    MethodNotAllowed,
    ValidationFailed,
    // Auth/Access
    AuthDenied,
    RateLimited,
    RateLimitConnectionSaturated,
    // Execution
    HandlerFailed,
    DownstreamUnavailable,
    Timeout,
    // Lifecycle
    ConnectorNotFound,
    ConnectorStartFailed,
    ConnectorStateInvalid,
    ConnectorCrashloop,
}

assistantd_core::simple_display! {
    ErrorCode {
        ProtocolInvalid => "PROTOCOL_INVALID",
        FrameTooLarge => "FRAME_TOO_LARGE",
        FrameTruncated => "FRAME_TRUNCATED",
        FrameMalformed => "FRAME_MALFORMED",
        NotFound => "NOT_FOUND",
        MethodNotAllowed => "METHOD_NOT_ALLOWED",
        ValidationFailed => "VALIDATION_FAILED",
        AuthDenied => "AUTH_DENIED",
        RateLimited => "RATE_LIMITED",
        RateLimitConnectionSaturated => "RATE_LIMIT_CONNECTION_SATURATED",
        HandlerFailed => "HANDLER_FAILED",
        DownstreamUnavailable => "DOWNSTREAM_UNAVAILABLE",
        Timeout => "TIMEOUT",
        ConnectorNotFound => "CONNECTOR_NOT_FOUND",
        ConnectorStartFailed => "CONNECTOR_START_FAILED",
        ConnectorStateInvalid => "CONNECTOR_STATE_INVALID",
        ConnectorCrashloop => "CONNECTOR_CRASHLOOP",
    }
}

impl ErrorCode {
    /// Whether a retry is ever sensible for this code, independent of the
    /// specific occurrence. Transient failures retry; permanent ones don't.
    pub fn can_retry(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::DownstreamUnavailable
                | Self::RateLimited
                | Self::RateLimitConnectionSaturated
        )
    }

    /// Whether the *system* (not necessarily the request) is in a recoverable
    /// state — distinct from `can_retry`, which is about this one request.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ConnectorCrashloop)
    }

    /// Pre-approved, non-sensitive text shown to the peer for this code.
    /// Never derived from the triggering exception — that detail stays in
    /// the server-side log keyed by `error_id`.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ProtocolInvalid => "the request envelope was malformed",
            Self::FrameTooLarge => "the request exceeded the maximum frame size",
            Self::FrameTruncated => "the connection closed before the frame was fully read",
            Self::FrameMalformed => "the frame body was not valid JSON",
            Self::NotFound => "no route matches the requested path",
            Self::MethodNotAllowed => "the method is not supported for this path",
            Self::ValidationFailed => "the request failed validation",
            Self::AuthDenied => "authentication failed",
            Self::RateLimited => "rate limit exceeded, retry later",
            Self::RateLimitConnectionSaturated => "too many in-flight requests on this connection",
            Self::HandlerFailed => "the request could not be completed",
            Self::DownstreamUnavailable => "a downstream collaborator is unavailable",
            Self::Timeout => "the request timed out",
            Self::ConnectorNotFound => "no connector with that id is registered",
            Self::ConnectorStartFailed => "the connector failed to start",
            Self::ConnectorStateInvalid => "the connector is not in a state that allows this operation",
            Self::ConnectorCrashloop => "the connector has exceeded its restart budget",
        }
    }
}

/// A safe, user-visible failure. Never contains stack traces, paths, or
/// internal types — `error_id` is the only thread back to the full context,
/// which is logged server-side at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_id: ErrorId,
    pub code: String,
    pub user_message: String,
    pub is_recoverable: bool,
    pub can_retry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl ErrorEnvelope {
    /// Build the envelope for one code, stamping a fresh `error_id`.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            error_id: ErrorId::new(),
            code: code.to_string(),
            user_message: code.user_message().to_string(),
            is_recoverable: code.is_recoverable(),
            can_retry: code.can_retry(),
            retry_after_ms: None,
        }
    }

    pub fn with_retry_after(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }
}

#[cfg(test)]
#[path = "envelope_error_tests.rs"]
mod tests;
