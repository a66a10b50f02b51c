// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The JSON-RPC 2.0 envelope exchanged with an agent's ACP endpoint
//! (§4.5). The id is always constructed by the caller as
//! `"<method>-<task_id>"` so responses can be matched to requests even
//! over a streaming connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    /// `None` for a notification; not used on any hot path today.
    pub id: Option<String>,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, task_id: &str, params: Value) -> Self {
        let method = method.into();
        let id = format!("{method}-{task_id}");
        RpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AcpError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent returned an rpc error {0:?}")]
    Rpc(RpcErrorObject),

    #[error("response id {got:?} did not match request id {expected:?}")]
    IdMismatch { expected: String, got: Option<String> },

    #[error("malformed ndjson frame: {0}")]
    InvalidFrame(String),

    #[error("advisory lock already held for this agent/task")]
    LockContended,
}

/// Validate a raw response envelope against the request it answers,
/// returning the `result` payload or an error (§4.5: "responses must
/// echo the id exactly; mismatch is a hard error").
pub fn extract_result(request_id: &str, response: RpcResponse) -> Result<Value, AcpError> {
    if response.id.as_deref() != Some(request_id) {
        return Err(AcpError::IdMismatch {
            expected: request_id.to_string(),
            got: response.id,
        });
    }
    if let Some(err) = response.error {
        return Err(AcpError::Rpc(err));
    }
    Ok(response.result.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_embeds_method_and_task() {
        let req = RpcRequest::new("task/create", "t-1", serde_json::json!({}));
        assert_eq!(req.id.as_deref(), Some("task/create-t-1"));
    }

    #[test]
    fn mismatched_id_is_rejected() {
        let resp = RpcResponse {
            jsonrpc: "2.0".to_string(),
            id: Some("other-id".to_string()),
            result: Some(Value::Null),
            error: None,
        };
        let err = extract_result("task/create-t-1", resp).unwrap_err();
        assert!(matches!(err, AcpError::IdMismatch { .. }));
    }

    #[test]
    fn rpc_error_object_surfaces() {
        let resp = RpcResponse {
            jsonrpc: "2.0".to_string(),
            id: Some("task/create-t-1".to_string()),
            result: None,
            error: Some(RpcErrorObject {
                code: -32602,
                message: "bad params".to_string(),
                data: None,
            }),
        };
        let err = extract_result("task/create-t-1", resp).unwrap_err();
        assert!(matches!(err, AcpError::Rpc(_)));
    }
}
