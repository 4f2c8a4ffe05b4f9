// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! assistantd-wire: the length-prefixed framing codec and the request/response
//! envelope types exchanged between the daemon and every client (desktop UI,
//! connector children, the CLI).

mod envelope_error;
mod frame;
mod reassembly;
mod request;
mod response;

pub use envelope_error::{ErrorCode, ErrorEnvelope};
pub use frame::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    MAX_FRAME,
};
pub use reassembly::{
    hex_sha256, split_into_chunks, ReassemblyError, StreamAssembler, StreamChunk, MAX_STREAM_SIZE,
    STREAM_DEADLINE,
};
pub use request::{Auth, Method, Request};
pub use response::{Response, Status};
