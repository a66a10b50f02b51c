// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! C5 — the ACP Proxy: an outbound JSON-RPC 2.0 client over HTTP (sync and
//! NDJSON-streamed), plus the header hygiene, webhook signature validation,
//! and advisory locking needed to forward arbitrary inbound HTTP to an
//! agent by name (§4.5). HMAC verification is grounded on
//! `sven-node`'s Slack webhook handler and `sven-node`'s bearer token
//! module, generalized to also cover GitHub-style signatures.

pub mod auth;
pub mod client;
pub mod envelope;
pub mod headers;
pub mod lock;
pub mod webhook;

pub use auth::{InMemoryApiKeyStore, SqlApiKeyStore};
pub use client::{AcpClient, AgentApiKeyStore};
pub use envelope::{AcpError, RpcRequest, RpcResponse};
pub use lock::{AdvisoryLockGuard, AdvisoryLockRegistry};
