// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Outbound JSON-RPC 2.0 calls to an agent's ACP endpoint: a single
//! synchronous POST, or a streamed POST whose body is newline-delimited
//! JSON response envelopes (§4.5).

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::Value;
use uuid::Uuid;

use crate::envelope::{extract_result, AcpError, RpcRequest, RpcResponse};

/// Looks up the per-agent API key attached as `x-agent-api-key` on
/// outbound calls, and the per-`(agent_id, external_id, provider)`
/// webhook signing secret used to validate inbound forwarded webhooks
/// (§4.5). A trait so `relay-dispatcher`/`relay-server` can back it
/// with whichever storage phase is active without this crate depending
/// on `relay-storage`.
#[async_trait]
pub trait AgentApiKeyStore: Send + Sync {
    async fn lookup(&self, agent_id: &str) -> Option<String>;

    /// `provider` is `"GITHUB"` or `"SLACK"`; `external_id` is the
    /// provider's own scoping key (a GitHub `repository.full_name`, a
    /// Slack `api_app_id`). Defaults to "no secret configured" so
    /// existing backings that predate webhook validation don't need to
    /// implement it.
    async fn lookup_webhook_secret(
        &self,
        _agent_id: &str,
        _external_id: &str,
        _provider: &str,
    ) -> Option<Vec<u8>> {
        None
    }
}

#[derive(Clone)]
pub struct AcpClient {
    http: reqwest::Client,
}

impl AcpClient {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(AcpClient { http })
    }

    fn correlation_id(request_id: Option<&str>) -> String {
        request_id
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    /// Single POST to `<acp_url>/api`, returning the parsed `result`
    /// or surfacing the agent's `error` object.
    pub async fn call_sync(
        &self,
        acp_url: &str,
        method: &str,
        task_id: &str,
        params: Value,
        api_key: Option<&str>,
        request_id: Option<&str>,
    ) -> Result<Value, AcpError> {
        self.call_sync_with_headers(acp_url, method, task_id, params, api_key, request_id, &[])
            .await
    }

    /// Same as [`Self::call_sync`], additionally forwarding `extra_headers`
    /// (already filtered by [`crate::headers::filter_for_forwarding`]) —
    /// used by `event/send` (§4.6.4), which overlays the caller's inbound
    /// headers beneath the agent's own auth headers.
    pub async fn call_sync_with_headers(
        &self,
        acp_url: &str,
        method: &str,
        task_id: &str,
        params: Value,
        api_key: Option<&str>,
        request_id: Option<&str>,
        extra_headers: &[(String, String)],
    ) -> Result<Value, AcpError> {
        let req = RpcRequest::new(method, task_id, params);
        let expected_id = req.id.clone().expect("request id always set on a call");

        let mut builder = self
            .http
            .post(format!("{acp_url}/api"))
            .header("x-request-id", Self::correlation_id(request_id));
        for (name, value) in extra_headers {
            builder = builder.header(name, value);
        }
        if let Some(key) = api_key {
            builder = builder.header("x-agent-api-key", key);
        }

        let response = builder.json(&req).send().await?.error_for_status()?;
        let body: RpcResponse = response.json().await?;
        extract_result(&expected_id, body)
    }

    /// POST with `Accept: application/x-ndjson`, yielding each frame's
    /// `result` in order. The HTTP connection is returned to the pool
    /// as soon as the returned stream is exhausted or dropped, on
    /// every exit path (success, error, or caller cancellation).
    pub async fn call_stream(
        &self,
        acp_url: &str,
        method: &str,
        task_id: &str,
        params: Value,
        api_key: Option<&str>,
        request_id: Option<&str>,
    ) -> Result<impl Stream<Item = Result<Value, AcpError>>, AcpError> {
        let req = RpcRequest::new(method, task_id, params);
        let expected_id = req.id.clone().expect("request id always set on a call");

        let mut builder = self
            .http
            .post(format!("{acp_url}/api"))
            .header("accept", "application/x-ndjson")
            .header("x-request-id", Self::correlation_id(request_id));
        if let Some(key) = api_key {
            builder = builder.header("x-agent-api-key", key);
        }

        let response = builder.json(&req).send().await?.error_for_status()?;
        Ok(ndjson_frames(response.bytes_stream(), expected_id))
    }
}

/// Split a byte stream on `\n` into `RpcResponse` frames, validating
/// and unwrapping each one against `expected_id`.
fn ndjson_frames<S>(byte_stream: S, expected_id: String) -> impl Stream<Item = Result<Value, AcpError>>
where
    S: Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin,
{
    struct State<S> {
        byte_stream: S,
        buffer: Vec<u8>,
        expected_id: String,
        finished: bool,
    }

    futures::stream::unfold(
        State {
            byte_stream,
            buffer: Vec::new(),
            expected_id,
            finished: false,
        },
        |mut state| async move {
            loop {
                if state.finished {
                    return None;
                }
                if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                    let mut line: Vec<u8> = state.buffer.drain(..=pos).collect();
                    line.pop(); // trailing '\n'
                    if line.is_empty() {
                        continue;
                    }
                    let item = parse_frame(&line, &state.expected_id);
                    return Some((item, state));
                }
                match state.byte_stream.next().await {
                    Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        state.finished = true;
                        return Some((Err(AcpError::Http(e)), state));
                    }
                    None => {
                        state.finished = true;
                        if state.buffer.is_empty() {
                            return None;
                        }
                        let line = std::mem::take(&mut state.buffer);
                        let item = parse_frame(&line, &state.expected_id);
                        return Some((item, state));
                    }
                }
            }
        },
    )
}

fn parse_frame(line: &[u8], expected_id: &str) -> Result<Value, AcpError> {
    let resp: RpcResponse =
        serde_json::from_slice(line).map_err(|e| AcpError::InvalidFrame(e.to_string()))?;
    extract_result(expected_id, resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn call_sync_returns_result_on_matching_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": "task/create-t-1",
                "result": {"status": "ok"}
            })))
            .mount(&server)
            .await;

        let client = AcpClient::new(Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        let result = client
            .call_sync(&server.uri(), "task/create", "t-1", serde_json::json!({}), None, None)
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn call_sync_surfaces_rpc_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": "task/create-t-1",
                "error": {"code": -32602, "message": "bad params"}
            })))
            .mount(&server)
            .await;

        let client = AcpClient::new(Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        let err = client
            .call_sync(&server.uri(), "task/create", "t-1", serde_json::json!({}), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AcpError::Rpc(_)));
    }

    #[tokio::test]
    async fn call_stream_yields_each_frame_in_order() {
        let server = MockServer::start().await;
        let body = format!(
            "{}\n{}\n",
            serde_json::json!({"jsonrpc": "2.0", "id": "message/send-t-1", "result": {"seq": 1}}),
            serde_json::json!({"jsonrpc": "2.0", "id": "message/send-t-1", "result": {"seq": 2}}),
        );
        Mock::given(method("POST"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let client = AcpClient::new(Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        let stream = client
            .call_stream(&server.uri(), "message/send", "t-1", serde_json::json!({}), None, None)
            .await
            .unwrap();
        let results: Vec<_> = stream.collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap()["seq"], 1);
        assert_eq!(results[1].as_ref().unwrap()["seq"], 2);
    }
}
