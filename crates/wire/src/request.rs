// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The decoded client call. See the external interfaces section for the
//! exact wire shape — this module is the typed mirror of it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dispatch kind. `STREAM_CHUNK` and `HEARTBEAT` route to the IPC layer's own
/// handling (reassembly, supervisor inbound) rather than business handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "QUERY")]
    Query,
    #[serde(rename = "MUTATE")]
    Mutate,
    #[serde(rename = "STREAM_CHUNK")]
    StreamChunk,
    #[serde(rename = "HEARTBEAT")]
    Heartbeat,
    #[serde(rename = "LIFECYCLE")]
    Lifecycle,
}

assistantd_core::simple_display! {
    Method {
        Query => "QUERY",
        Mutate => "MUTATE",
        StreamChunk => "STREAM_CHUNK",
        Heartbeat => "HEARTBEAT",
        Lifecycle => "LIFECYCLE",
    }
}

/// Optional per-session credential for UI clients (distinct from the local
/// peer-credential check, which is always performed regardless of this).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default = "default_body")]
    pub body: Value,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
}

fn default_body() -> Value {
    Value::Null
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Map::new(),
            body: Value::Null,
            correlation_id: correlation_id.into(),
            auth: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(Auth { token: Some(token.into()) });
        self
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
