// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path + method dispatch. Routes compile into a trie keyed on path
//! segments; a `:param` segment captures into the resolved params map.
//! Resolution is O(path depth) and deterministic: a literal segment always
//! wins over a param segment at the same position.

use std::collections::HashMap;
use std::sync::Arc;

use assistantd_wire::{ErrorCode, Method};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Context a handler receives for one request; carries only what §4.9's
/// Service Facade and the wire envelope expose, nothing route-specific.
pub struct HandlerContext {
    pub params: HashMap<String, String>,
    pub body: Value,
    pub correlation_id: String,
    pub cancel: CancellationToken,
}

/// A handler's synchronous failure. `Message` maps to `ErrorCode::HandlerFailed`
/// on the wire; `Coded` lets a handler pick a more specific taxonomy code
/// (e.g. a connector lifecycle handler reporting `CONNECTOR_NOT_FOUND`).
#[derive(Debug, Error)]
pub enum HandlerFailure {
    #[error("{0}")]
    Message(String),
    #[error("{1}")]
    Coded(ErrorCode, String),
}

impl HandlerFailure {
    pub fn code(&self) -> ErrorCode {
        match self {
            HandlerFailure::Message(_) => ErrorCode::HandlerFailed,
            HandlerFailure::Coded(code, _) => *code,
        }
    }
}

#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, ctx: HandlerContext) -> Result<Value, HandlerFailure>;
}

/// Adapts a plain async closure to [`RouteHandler`] so core routes don't
/// need a one-off struct each.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> RouteHandler for FnHandler<F>
where
    F: Fn(HandlerContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, HandlerFailure>> + Send,
{
    async fn handle(&self, ctx: HandlerContext) -> Result<Value, HandlerFailure> {
        (self.0)(ctx).await
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("route already registered: {0:?} {1}")]
    DuplicateRoute(Method, String),
    #[error("route pattern must start with '/': {0}")]
    InvalidPattern(String),
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no route matches this path")]
    NotFound,
    #[error("path exists but not for this method")]
    MethodNotAllowed,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param(String),
}

fn split_pattern(pattern: &str) -> Result<Vec<Segment>, RouterError> {
    if !pattern.starts_with('/') {
        return Err(RouterError::InvalidPattern(pattern.to_string()));
    }
    Ok(pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|seg| match seg.strip_prefix(':') {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(seg.to_string()),
        })
        .collect())
}

struct RouteEntry {
    handler: Arc<dyn RouteHandler>,
    pattern: String,
}

#[derive(Default)]
struct Node {
    literal_children: HashMap<String, Node>,
    param_child: Option<(String, Box<Node>)>,
    handlers: HashMap<Method, RouteEntry>,
}

/// Mutable route table under construction. Consumed by [`RouterBuilder::freeze`]
/// into an immutable [`Router`] before the listener ever accepts traffic.
#[derive(Default)]
pub struct RouterBuilder {
    root: Node,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<(), RouterError> {
        let segments = split_pattern(pattern)?;
        let mut node = &mut self.root;
        for segment in segments {
            node = match segment {
                Segment::Literal(lit) => node.literal_children.entry(lit).or_default(),
                Segment::Param(name) => &mut node.param_child.get_or_insert_with(|| (name, Box::default())).1,
            };
        }
        if node.handlers.contains_key(&method) {
            return Err(RouterError::DuplicateRoute(method, pattern.to_string()));
        }
        node.handlers.insert(method, RouteEntry { handler, pattern: pattern.to_string() });
        Ok(())
    }

    pub fn freeze(self) -> Router {
        Router { root: self.root }
    }
}

/// Immutable, read-only-shared route table.
pub struct Router {
    root: Node,
}

pub struct Resolved {
    pub handler: Arc<dyn RouteHandler>,
    pub params: HashMap<String, String>,
    /// The registered pattern, e.g. `/connectors/:id/start` — used as the
    /// rate-limit route class so `/connectors/fs/start` and
    /// `/connectors/gdrive/start` share one bucket.
    pub pattern: String,
}

impl Router {
    pub fn resolve(&self, method: Method, path: &str) -> Result<Resolved, RouteError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut node = &self.root;
        let mut params = HashMap::new();

        for segment in segments {
            if let Some(next) = node.literal_children.get(segment) {
                node = next;
                continue;
            }
            if let Some((name, next)) = &node.param_child {
                params.insert(name.clone(), segment.to_string());
                node = next;
                continue;
            }
            return Err(RouteError::NotFound);
        }

        match node.handlers.get(&method) {
            Some(entry) => {
                Ok(Resolved { handler: Arc::clone(&entry.handler), params, pattern: entry.pattern.clone() })
            }
            None if node.handlers.is_empty() => Err(RouteError::NotFound),
            None => Err(RouteError::MethodNotAllowed),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
