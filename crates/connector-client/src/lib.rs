// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! assistantd-connector-client: the library a native connector process links
//! against to find the daemon's endpoint, connect over its transport, and
//! exchange requests and responses, including reassembly of oversized
//! payloads sent as `STREAM_CHUNK` sequences.

mod client;
mod discovery;

pub use client::{ClientError, ConnectorClient, DEFAULT_REQUEST_TIMEOUT};
pub use discovery::{DiscoveryError, Endpoint};
