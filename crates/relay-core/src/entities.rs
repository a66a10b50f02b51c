// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The data model from spec §3: `Agent`, `Task`, `TaskMessage`, `Event`, and
//! the tagged-union `Content` carried by a message. IDs are opaque strings so
//! either backend (document store or relational store) can own generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::TaskMessageContent;

/// Fields every persisted entity carries. `created_at` is set once on
/// insert and never touched again; `updated_at` is refreshed on every
/// write. `updated_at >= created_at` always holds.
pub trait Timestamped {
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AcpType {
    Agentic,
    Sync,
    Async,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub acp_url: String,
    pub acp_type: AcpType,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamped for Agent {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Task lifecycle (§3, §4.6.4). `Running` is the sole non-terminal state;
/// every other variant is a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    Canceled,
    Terminated,
    TimedOut,
}

impl TaskStatus {
    /// Terminal states are sinks; only `Running` may transition further.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: Option<String>,
    pub agent_id: String,
    pub status: TaskStatus,
    pub status_reason: Option<String>,
    pub params: Option<Value>,
    pub task_metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamped for Task {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Task {
    /// Apply a state transition, refusing to move out of a terminal state
    /// except for the cancel-is-idempotent case handled by the caller.
    pub fn transition(&mut self, status: TaskStatus, reason: Option<String>) {
        self.status = status;
        self.status_reason = reason;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamingStatus {
    InProgress,
    Done,
}

impl StreamingStatus {
    /// `null -> IN_PROGRESS -> DONE`, no regressions (§3 invariants).
    pub fn can_transition_to(current: Option<StreamingStatus>, next: StreamingStatus) -> bool {
        match (current, next) {
            (None, _) => true,
            (Some(StreamingStatus::InProgress), StreamingStatus::Done) => true,
            (Some(StreamingStatus::InProgress), StreamingStatus::InProgress) => true,
            (Some(StreamingStatus::Done), StreamingStatus::Done) => true,
            (Some(StreamingStatus::Done), StreamingStatus::InProgress) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: String,
    pub task_id: String,
    pub content: TaskMessageContent,
    pub streaming_status: Option<StreamingStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamped for TaskMessage {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub task_id: String,
    pub agent_id: String,
    pub content: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamped for Event {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A generic key/value slot for the `/states` surface (§6). Unlike the
/// other entities, callers address this one by name only — `name` is
/// required and doubles as the lookup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    pub id: String,
    pub name: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamped for StateEntry {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Methods the dispatcher (C6) accepts. Mirrors §6's JSON-RPC method list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcMethod {
    #[serde(rename = "task/create")]
    TaskCreate,
    #[serde(rename = "message/send")]
    MessageSend,
    #[serde(rename = "task/cancel")]
    TaskCancel,
    #[serde(rename = "event/send")]
    EventSend,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::TaskCreate => "task/create",
            RpcMethod::MessageSend => "message/send",
            RpcMethod::TaskCancel => "task/cancel",
            RpcMethod::EventSend => "event/send",
        }
    }

    /// Table from §4.6 step 1: which methods each ACP type accepts.
    pub fn allowed_for(&self, acp_type: AcpType) -> bool {
        match acp_type {
            AcpType::Agentic => true,
            AcpType::Sync => matches!(self, RpcMethod::MessageSend | RpcMethod::TaskCancel),
            AcpType::Async => matches!(
                self,
                RpcMethod::TaskCreate | RpcMethod::MessageSend | RpcMethod::TaskCancel
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_sinks() {
        assert!(!TaskStatus::Running.is_terminal());
        for s in [
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Canceled,
            TaskStatus::Terminated,
            TaskStatus::TimedOut,
        ] {
            assert!(s.is_terminal());
        }
    }

    #[test]
    fn streaming_status_never_regresses() {
        assert!(StreamingStatus::can_transition_to(
            Some(StreamingStatus::Done),
            StreamingStatus::Done
        ));
        assert!(!StreamingStatus::can_transition_to(
            Some(StreamingStatus::Done),
            StreamingStatus::InProgress
        ));
        assert!(StreamingStatus::can_transition_to(
            None,
            StreamingStatus::InProgress
        ));
    }

    #[test]
    fn agentic_allows_every_method() {
        for m in [
            RpcMethod::TaskCreate,
            RpcMethod::MessageSend,
            RpcMethod::TaskCancel,
            RpcMethod::EventSend,
        ] {
            assert!(m.allowed_for(AcpType::Agentic));
        }
    }

    #[test]
    fn sync_rejects_task_create() {
        assert!(!RpcMethod::TaskCreate.allowed_for(AcpType::Sync));
        assert!(RpcMethod::MessageSend.allowed_for(AcpType::Sync));
    }
}
