// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed frame codec: `[u32_be length][utf8 JSON body]`.
//!
//! `encode`/`decode` are pure JSON (de)serialization with no length prefix.
//! `read_message`/`write_message` own the prefix and the partial-read/write
//! looping. `read_request`/`write_response` are the timeout-wrapped,
//! envelope-typed entry points the listener and the connector client
//! actually call.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::request::Request;
use crate::response::Response;

/// Largest permitted frame body, in bytes. `1 <= length <= MAX_FRAME`.
pub const MAX_FRAME: u32 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame body exceeds {MAX_FRAME} bytes")]
    FrameTooLarge,

    #[error("connection closed before the frame was fully read")]
    FrameTruncated,

    #[error("frame body was not valid UTF-8 JSON: {0}")]
    FrameMalformed(String),

    #[error("timed out waiting for frame")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize a value to its raw JSON bytes. No length prefix — callers that
/// want the on-wire frame use [`write_message`].
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(value).map_err(|e| ProtocolError::FrameMalformed(e.to_string()))
}

/// Deserialize a value from raw JSON bytes (no length prefix expected).
/// Rejects an empty body per the zero-length boundary rule.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    if bytes.is_empty() {
        return Err(ProtocolError::FrameMalformed("empty frame body".to_string()));
    }
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::FrameMalformed(e.to_string()))
}

/// Write one length-prefixed frame, looping until every byte is flushed.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
) -> Result<(), ProtocolError> {
    if body.is_empty() {
        return Err(ProtocolError::FrameMalformed("empty frame body".to_string()));
    }
    if body.len() as u64 > MAX_FRAME as u64 {
        return Err(ProtocolError::FrameTooLarge);
    }
    let header = (body.len() as u32).to_be_bytes();
    writer.write_all(&header).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame, looping across partial OS reads for both
/// the 4-byte header and the N-byte body. The body length is validated
/// *before* reading the body, so an oversize frame never buffers its payload.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut header = [0u8; 4];
    read_exact_or_eof(reader, &mut header).await?;
    let len = u32::from_be_bytes(header);

    if len == 0 {
        return Err(ProtocolError::FrameMalformed("zero-length frame".to_string()));
    }
    if len > MAX_FRAME {
        return Err(ProtocolError::FrameTooLarge);
    }

    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ProtocolError::FrameTruncated,
            _ => ProtocolError::Io(e),
        })?;
    Ok(body)
}

/// Like `read_exact`, but a clean EOF on the very first byte is reported as
/// `ConnectionClosed` (ordinary disconnect) rather than `FrameTruncated`
/// (a frame that started but never finished).
async fn read_exact_or_eof<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<(), ProtocolError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                ProtocolError::ConnectionClosed
            } else {
                ProtocolError::FrameTruncated
            });
        }
        filled += n;
    }
    Ok(())
}

/// Read one frame and parse it as a [`Request`], bounded by `timeout`.
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let body = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&body)
}

/// Encode and write a [`Response`], bounded by `timeout`.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let body = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &body))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
