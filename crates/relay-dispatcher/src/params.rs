// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Per-method request/response shapes for `handle_rpc_request` (§4.6).
//! One variant per JSON-RPC method so the dispatcher can match params
//! against the method before doing any work, rather than trusting a
//! loosely-typed `Value`.

use relay_core::content::TaskMessageContent;
use relay_core::{Event, RpcMethod, Task, TaskMessage, TaskMessageUpdate};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct CreateTaskParams {
    pub name: Option<String>,
    pub params: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct SendMessageParams {
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub task_params: Option<Value>,
    pub content: TaskMessageContent,
    pub stream: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CancelTaskParams {
    pub task_id: Option<String>,
    pub task_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SendEventParams {
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub content: Value,
}

#[derive(Debug, Clone)]
pub enum RpcParams {
    TaskCreate(CreateTaskParams),
    MessageSend(SendMessageParams),
    TaskCancel(CancelTaskParams),
    EventSend(SendEventParams),
}

impl RpcParams {
    /// The method these params were constructed for, used to catch a
    /// caller passing mismatched params for the `method` argument.
    pub fn method(&self) -> RpcMethod {
        match self {
            RpcParams::TaskCreate(_) => RpcMethod::TaskCreate,
            RpcParams::MessageSend(_) => RpcMethod::MessageSend,
            RpcParams::TaskCancel(_) => RpcMethod::TaskCancel,
            RpcParams::EventSend(_) => RpcMethod::EventSend,
        }
    }
}

/// What `handle_rpc_request` hands back to its caller (§4.6: "a `Task`,
/// an `Event`, a list of `TaskMessage`, or an async sequence of
/// `TaskMessageUpdate`").
pub enum RpcOutcome {
    Task(Task),
    Event(Event),
    Messages(Vec<TaskMessage>),
    Stream(std::pin::Pin<Box<dyn futures::Stream<Item = Result<TaskMessageUpdate, relay_core::RelayError>> + Send>>),
}
