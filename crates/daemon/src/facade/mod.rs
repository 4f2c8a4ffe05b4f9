// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A process-local typed registry handlers use to reach collaborators
//! (supervisor, db, graph, vector, env context) without per-callsite
//! global imports. Not a DI container: single instance per concrete type,
//! write-once at startup, lock-free-ish reads after freeze.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Default)]
pub struct ServiceFacade {
    entries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl ServiceFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` once. Calling this twice for the same `T` is a
    /// startup-time bug, not a request-time failure, so it panics rather
    /// than returning a `Result`.
    pub fn register<T: Send + Sync + 'static>(&self, instance: T) {
        let mut entries = self.entries.write();
        let previous = entries.insert(TypeId::of::<T>(), Arc::new(instance));
        assert!(previous.is_none(), "service already registered: {}", std::any::type_name::<T>());
    }

    /// Total lookup: panics if `T` was never registered. Call only during
    /// startup validation, never from a request handler.
    #[allow(clippy::panic)]
    pub fn get<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.try_get::<T>()
            .unwrap_or_else(|| panic!("service not registered: {}", std::any::type_name::<T>()))
    }

    /// Optional lookup for collaborators that may legitimately be absent.
    pub fn try_get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let entries = self.entries.read();
        entries.get(&TypeId::of::<T>()).cloned().map(|any| {
            any.downcast::<T>().unwrap_or_else(|_| {
                unreachable!("TypeId lookup guarantees the downcast always succeeds")
            })
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
