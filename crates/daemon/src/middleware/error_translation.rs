// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The outermost middleware step: turns any failure into a safe
//! [`ErrorEnvelope`], logging the full context once per (code, route)
//! within a dedupe window and collapsing additional occurrences to a
//! reduced-frequency debug count (§7).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use assistantd_wire::{ErrorCode, ErrorEnvelope};
use tracing::{debug, error};

/// One per connection; the dedupe window only makes sense scoped to a
/// single connection per spec.md §4.7.
pub struct ErrorTranslator {
    window: Duration,
    recent: HashMap<(&'static str, String), (Instant, u64)>,
}

impl ErrorTranslator {
    pub fn new(window: Duration) -> Self {
        Self { window, recent: HashMap::new() }
    }

    /// `detail` is the raw, possibly sensitive context for the server log
    /// only; it never reaches the returned envelope.
    pub fn translate(
        &mut self,
        code: ErrorCode,
        route: &str,
        detail: &str,
        now: Instant,
    ) -> ErrorEnvelope {
        let envelope = ErrorEnvelope::new(code);
        let key = (code_key(code), route.to_string());

        let log_full = match self.recent.get_mut(&key) {
            Some((first_seen, count)) if now.duration_since(*first_seen) < self.window => {
                *count += 1;
                false
            }
            _ => {
                self.recent.insert(key, (now, 1));
                true
            }
        };

        if log_full {
            error!(error_id = %envelope.error_id, code = %code, route, detail, "request failed");
        } else {
            debug!(code = %code, route, "repeated error suppressed within dedupe window");
        }

        envelope
    }
}

fn code_key(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::ProtocolInvalid => "PROTOCOL_INVALID",
        ErrorCode::FrameTooLarge => "FRAME_TOO_LARGE",
        ErrorCode::FrameTruncated => "FRAME_TRUNCATED",
        ErrorCode::FrameMalformed => "FRAME_MALFORMED",
        ErrorCode::NotFound => "NOT_FOUND",
        ErrorCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
        ErrorCode::ValidationFailed => "VALIDATION_FAILED",
        ErrorCode::AuthDenied => "AUTH_DENIED",
        ErrorCode::RateLimited => "RATE_LIMITED",
        ErrorCode::RateLimitConnectionSaturated => "RATE_LIMIT_CONNECTION_SATURATED",
        ErrorCode::HandlerFailed => "HANDLER_FAILED",
        ErrorCode::DownstreamUnavailable => "DOWNSTREAM_UNAVAILABLE",
        ErrorCode::Timeout => "TIMEOUT",
        ErrorCode::ConnectorNotFound => "CONNECTOR_NOT_FOUND",
        ErrorCode::ConnectorStartFailed => "CONNECTOR_START_FAILED",
        ErrorCode::ConnectorStateInvalid => "CONNECTOR_STATE_INVALID",
        ErrorCode::ConnectorCrashloop => "CONNECTOR_CRASHLOOP",
    }
}

#[cfg(test)]
#[path = "error_translation_tests.rs"]
mod tests;
