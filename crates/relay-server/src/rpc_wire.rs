// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The inbound JSON-RPC envelope callers speak to `/agents/*/rpc` (§6):
//! `{id, method, params}` in, `{id, result, error}` out. Unrelated to
//! `relay_acp::envelope`, which is the outbound shape this service
//! speaks to an agent's own ACP endpoint.

use relay_core::content::TaskMessageContent;
use relay_core::{RelayError, RpcMethod};
use relay_dispatcher::{CancelTaskParams, CreateTaskParams, RpcParams, SendEventParams, SendMessageParams};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct RpcRequestBody {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponseBody {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

impl RpcResponseBody {
    pub fn ok(id: Value, result: Value) -> Self {
        RpcResponseBody { id, result: Some(result), error: None }
    }

    pub fn from_relay_error(id: Value, error: &RelayError) -> Self {
        RpcResponseBody {
            id,
            result: None,
            error: Some(RpcErrorBody { code: error.rpc_code(), message: error.to_string() }),
        }
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        RpcResponseBody {
            id,
            result: None,
            error: Some(RpcErrorBody { code: -32601, message: format!("method not found: {method}") }),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct CreateTaskParamsWire {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SendMessageParamsWire {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    task_name: Option<String>,
    #[serde(default)]
    task_params: Option<Value>,
    content: Value,
    #[serde(default)]
    stream: bool,
}

#[derive(Debug, Deserialize, Default)]
struct CancelTaskParamsWire {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    task_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SendEventParamsWire {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    task_name: Option<String>,
    #[serde(default)]
    content: Value,
}

/// Routes on `method`, parsed client-side of `handle_rpc_request` so an
/// unknown method surfaces as `-32601` rather than a generic client
/// error. `Ok(None)` means the method name wasn't recognized.
pub fn parse_rpc_request(method: &str, params: Value) -> Option<Result<(RpcMethod, RpcParams), RelayError>> {
    match method {
        "task/create" => Some(parse_params::<CreateTaskParamsWire>(params).map(|p| {
            (RpcMethod::TaskCreate, RpcParams::TaskCreate(CreateTaskParams { name: p.name, params: p.params }))
        })),
        "message/send" => Some(parse_params::<SendMessageParamsWire>(params).and_then(|p| {
            let content: TaskMessageContent = serde_json::from_value(p.content)
                .map_err(|e| RelayError::ClientError(format!("invalid content: {e}")))?;
            Ok((
                RpcMethod::MessageSend,
                RpcParams::MessageSend(SendMessageParams {
                    task_id: p.task_id,
                    task_name: p.task_name,
                    task_params: p.task_params,
                    content,
                    stream: p.stream,
                }),
            ))
        })),
        "task/cancel" => Some(parse_params::<CancelTaskParamsWire>(params).map(|p| {
            (RpcMethod::TaskCancel, RpcParams::TaskCancel(CancelTaskParams { task_id: p.task_id, task_name: p.task_name }))
        })),
        "event/send" => Some(parse_params::<SendEventParamsWire>(params).map(|p| {
            (RpcMethod::EventSend, RpcParams::EventSend(SendEventParams { task_id: p.task_id, task_name: p.task_name, content: p.content }))
        })),
        _ => None,
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, RelayError> {
    serde_json::from_value(params).map_err(|e| RelayError::ClientError(format!("invalid params: {e}")))
}
