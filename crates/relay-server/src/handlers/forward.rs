// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `GET|POST /agents/forward/name/{agent_name}/{path...}` (§4.5): forward
//! an arbitrary inbound request to the named agent's own HTTP surface.
//! Unlike `relay_acp::AcpClient`, which always POSTs JSON-RPC envelopes
//! to `<acp_url>/api`, this proxy hits `<acp_url>/<path>` with the
//! caller's own method and body — a distinct client, not a reuse of the
//! RPC path.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use relay_acp::headers::filter_for_forwarding;
use relay_acp::webhook::{verify_github_signature, verify_slack_signature, WebhookError};
use relay_acp::AgentApiKeyStore;
use relay_core::{Agent, RelayError};
use relay_storage::StoragePort;

use crate::error::ApiError;
use crate::state::AppState;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn webhook_error_to_relay_error(err: WebhookError) -> RelayError {
    match err {
        WebhookError::InvalidBody | WebhookError::StaleTimestamp => RelayError::ClientError(err.to_string()),
        WebhookError::MalformedSignature | WebhookError::InvalidTimestamp | WebhookError::InvalidSignature => {
            RelayError::AuthError(err.to_string())
        }
    }
}

/// If the inbound request carries a GitHub or Slack webhook signature
/// header, validate it against the agent's configured signing secret
/// before the request is allowed to reach the upstream agent (§4.5).
/// Requests carrying neither header aren't webhooks and pass through
/// unchecked — this proxy also forwards plain agent-to-agent traffic.
async fn verify_webhook_signature(
    api_keys: &dyn AgentApiKeyStore,
    agent_id: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), RelayError> {
    if let Some(signature) = header_str(headers, "x-hub-signature-256") {
        let payload: serde_json::Value =
            serde_json::from_slice(body).map_err(|_| RelayError::ClientError(WebhookError::InvalidBody.to_string()))?;
        let external_id = payload
            .get("repository")
            .and_then(|r| r.get("full_name"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| RelayError::ClientError(WebhookError::InvalidBody.to_string()))?;

        let secret = api_keys
            .lookup_webhook_secret(agent_id, external_id, "GITHUB")
            .await
            .ok_or_else(|| RelayError::AuthError("no webhook secret configured for this github repository".to_string()))?;

        verify_github_signature(&secret, body, signature).map_err(webhook_error_to_relay_error)?;
    } else if let Some(signature) = header_str(headers, "x-slack-signature") {
        let timestamp = header_str(headers, "x-slack-request-timestamp")
            .ok_or(WebhookError::InvalidTimestamp)
            .map_err(webhook_error_to_relay_error)?;
        let payload: serde_json::Value =
            serde_json::from_slice(body).map_err(|_| RelayError::ClientError(WebhookError::InvalidBody.to_string()))?;
        let external_id = payload
            .get("api_app_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RelayError::ClientError(WebhookError::InvalidBody.to_string()))?;

        let secret = api_keys
            .lookup_webhook_secret(agent_id, external_id, "SLACK")
            .await
            .ok_or_else(|| RelayError::AuthError("no webhook secret configured for this slack app".to_string()))?;

        verify_slack_signature(&secret, timestamp, body, signature).map_err(webhook_error_to_relay_error)?;
    }
    Ok(())
}

pub async fn forward<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path((agent_name, path)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError>
where
    Agents: StoragePort<Agent> + Clone + Send + Sync + 'static,
{
    let agent = state.agents.get(None, Some(&agent_name)).await.map_err(RelayError::from)?;
    if agent.acp_url.is_empty() {
        return Err(RelayError::ClientError(format!("agent {} does not have an acp url configured", agent.id)).into());
    }

    verify_webhook_signature(state.api_keys.as_ref(), &agent.id, &headers, &body).await?;

    let api_key = state.api_keys.lookup(&agent.id).await;
    let inbound: Vec<(String, String)> = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();
    let overlay: Vec<(&str, String)> = api_key
        .map(|key| vec![("x-agent-api-key", key)])
        .unwrap_or_default();
    let forwarded = filter_for_forwarding(
        inbound.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        overlay,
    );

    let url = format!("{}/{}", agent.acp_url.trim_end_matches('/'), path.trim_start_matches('/'));
    let mut request = state.forward_http.request(method, &url).body(body);
    for (name, value) in &forwarded {
        request = request.header(name.as_str(), value.as_str());
    }

    let upstream = request
        .send()
        .await
        .map_err(|e| RelayError::service(format!("forwarding request to {agent_name} failed: {e}")))?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .cloned();
    let stream = upstream.bytes_stream();

    let mut response = Response::builder().status(status);
    if let Some(content_type) = content_type {
        response = response.header(axum::http::header::CONTENT_TYPE, content_type.as_bytes());
    }
    let response = response
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response());
    Ok(response)
}
