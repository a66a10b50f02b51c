// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Shared entities, error taxonomy, and environment configuration for the
//! agent control plane. Every other `relay-*` crate depends on this one and
//! nothing else in the workspace; it has no I/O of its own.

pub mod config;
pub mod content;
pub mod entities;
pub mod error;
pub mod update;

pub use config::{RelayConfig, StoragePhase};
pub use content::{TaskMessageContent, TaskMessageDelta};
pub use entities::{
    Agent, AcpType, AgentStatus, Event, RpcMethod, StateEntry, Task, TaskMessage, TaskStatus,
};
pub use error::RelayError;
pub use update::TaskMessageUpdate;
