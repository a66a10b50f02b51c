// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! C7 — the axum HTTP surface (§6): RPC dispatch, task listing, the
//! generic state store, the forwarding proxy, and the task SSE stream.
//! Wraps `relay-dispatcher::RpcDispatcher` behind HTTP without adding
//! policy of its own; every decision here is either "how to shape this
//! as a response" or "which repository to ask".

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod rpc_wire;
pub mod state;

pub use router::build_router;
pub use state::{AppState, TaskEvent};
