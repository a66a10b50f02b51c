// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! C6 — the RPC dispatcher: resolves an agent, authorizes the caller,
//! and routes `task/create`, `message/send`, `task/cancel`, `event/send`
//! to the ACP proxy, assembling streamed responses into persisted
//! `TaskMessage` rows as they arrive (§4.6).

pub mod accumulator;
pub mod authorization;
pub mod dispatcher;
pub mod params;
pub mod stream_assembly;

pub use accumulator::{initial_content_from_delta, DeltaAccumulator};
pub use authorization::{AllowAllAuthorization, AuthorizationPort, Operation, Resource};
pub use dispatcher::RpcDispatcher;
pub use params::{
    CancelTaskParams, CreateTaskParams, RpcOutcome, RpcParams, SendEventParams, SendMessageParams,
};
pub use stream_assembly::assemble_stream;
