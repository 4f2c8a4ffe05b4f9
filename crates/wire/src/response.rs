// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The decoded server reply. Exactly one `Response` is emitted per
//! non-streaming `Request`, echoing its `correlation_id`.

use assistantd_core::TraceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope_error::ErrorEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub correlation_id: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    pub trace_id: TraceId,
}

impl Response {
    /// A successful reply. `trace_id` is assigned by the Trace/Log
    /// middleware step, not chosen by the handler.
    pub fn ok(correlation_id: impl Into<String>, trace_id: TraceId, data: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status: Status::Ok,
            data: Some(data),
            error: None,
            trace_id,
        }
    }

    /// A failing reply. Never constructed directly by a handler — only by
    /// the Error Translator, so every failure path funnels through one
    /// place that stamps `error_id` and logs the full context.
    pub fn error(correlation_id: impl Into<String>, trace_id: TraceId, error: ErrorEnvelope) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status: Status::Error,
            data: None,
            error: Some(error),
            trace_id,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, Status::Ok)
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
