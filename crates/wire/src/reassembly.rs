// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reassembly of `STREAM_CHUNK` frames into one logical payload.
//!
//! The core only guarantees frame-level reassembly and ordering; whether any
//! particular business route actually streams is a matter for route
//! registration. This assembler is shared by the daemon's listener (for
//! inbound chunked requests) and the connector client (for outbound ones),
//! since both sides need the identical bound/checksum semantics.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Upper bound on a fully reassembled stream payload.
pub const MAX_STREAM_SIZE: usize = 16 * 1024 * 1024;

/// A session with no new chunks for this long is evicted and further chunks
/// for it are rejected.
pub const STREAM_DEADLINE: Duration = Duration::from_secs(30);

/// One chunk of a streamed payload, carried as the `body` of a
/// `STREAM_CHUNK` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub session_id: String,
    pub index: u32,
    pub total: u32,
    /// This chunk's slice of the reassembled payload's UTF-8 bytes.
    pub data: String,
    /// Hex-encoded SHA-256 of the fully reassembled payload. Identical on
    /// every chunk of a session; checked once the last chunk arrives.
    pub checksum: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    #[error("stream session {0} has no chunks pending (expired or never started)")]
    UnknownSession(String),
    #[error("stream session {0} exceeded the {MAX_STREAM_SIZE}-byte bound")]
    SizeExceeded(String),
    #[error("stream session {0} exceeded the {STREAM_DEADLINE:?} deadline")]
    DeadlineExceeded(String),
    #[error("chunk index {index} out of range for total {total} in session {session}")]
    IndexOutOfRange { session: String, index: u32, total: u32 },
    #[error("session {0} saw inconsistent `total` across chunks")]
    InconsistentTotal(String),
    #[error("duplicate chunk {index} for session {session}")]
    DuplicateChunk { session: String, index: u32 },
    #[error("session {0} failed checksum verification after reassembly")]
    ChecksumMismatch(String),
}

struct PendingSession {
    total: u32,
    chunks: HashMap<u32, String>,
    size_bytes: usize,
    checksum: String,
    started_at: Instant,
}

/// Accumulates chunks per `session_id` until `total` unique indices have
/// arrived, then verifies the checksum and hands back the reassembled bytes.
#[derive(Default)]
pub struct StreamAssembler {
    sessions: HashMap<String, PendingSession>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk in. Returns `Some(bytes)` once the session is complete
    /// and its checksum verifies; `None` while more chunks are still needed.
    pub fn insert(&mut self, chunk: StreamChunk, now: Instant) -> Result<Option<Vec<u8>>, ReassemblyError> {
        if let Some(existing) = self.sessions.get(&chunk.session_id) {
            if now.duration_since(existing.started_at) >= STREAM_DEADLINE {
                self.sessions.remove(&chunk.session_id);
                return Err(ReassemblyError::DeadlineExceeded(chunk.session_id));
            }
        }
        self.evict_expired(now);

        if chunk.index >= chunk.total {
            return Err(ReassemblyError::IndexOutOfRange {
                session: chunk.session_id,
                index: chunk.index,
                total: chunk.total,
            });
        }

        let entry = self.sessions.entry(chunk.session_id.clone()).or_insert_with(|| PendingSession {
            total: chunk.total,
            chunks: HashMap::new(),
            size_bytes: 0,
            checksum: chunk.checksum.clone(),
            started_at: now,
        });

        if entry.total != chunk.total {
            return Err(ReassemblyError::InconsistentTotal(chunk.session_id));
        }
        if entry.chunks.contains_key(&chunk.index) {
            return Err(ReassemblyError::DuplicateChunk { session: chunk.session_id, index: chunk.index });
        }

        entry.size_bytes += chunk.data.len();
        if entry.size_bytes > MAX_STREAM_SIZE {
            let session = chunk.session_id.clone();
            self.sessions.remove(&session);
            return Err(ReassemblyError::SizeExceeded(session));
        }
        entry.chunks.insert(chunk.index, chunk.data);

        if entry.chunks.len() as u32 != entry.total {
            return Ok(None);
        }

        let session = self.sessions.remove(&chunk.session_id).expect("just inserted");
        let mut payload = Vec::with_capacity(session.size_bytes);
        for i in 0..session.total {
            let part = session.chunks.get(&i).expect("all indices present by count check");
            payload.extend_from_slice(part.as_bytes());
        }

        let digest = hex_sha256(&payload);
        if digest != session.checksum {
            return Err(ReassemblyError::ChecksumMismatch(chunk.session_id));
        }
        Ok(Some(payload))
    }

    /// Remove sessions that haven't seen a chunk within `STREAM_DEADLINE`.
    pub fn evict_expired(&mut self, now: Instant) {
        self.sessions.retain(|_, s| now.duration_since(s.started_at) < STREAM_DEADLINE);
    }

    pub fn pending_session_count(&self) -> usize {
        self.sessions.len()
    }
}

pub fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Split `payload` into `StreamChunk`s of at most `chunk_size` bytes each,
/// all sharing one `session_id` and the payload's checksum.
pub fn split_into_chunks(session_id: impl Into<String>, payload: &[u8], chunk_size: usize) -> Vec<StreamChunk> {
    let session_id = session_id.into();
    let checksum = hex_sha256(payload);
    let total = payload.len().div_ceil(chunk_size).max(1) as u32;
    payload
        .chunks(chunk_size.max(1))
        .enumerate()
        .map(|(i, slice)| StreamChunk {
            session_id: session_id.clone(),
            index: i as u32,
            total,
            data: String::from_utf8_lossy(slice).into_owned(),
            checksum: checksum.clone(),
        })
        .collect()
}

#[cfg(test)]
#[path = "reassembly_tests.rs"]
mod tests;
