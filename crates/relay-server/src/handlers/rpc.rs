// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `POST /agents/{agent_id}/rpc` and `POST /agents/name/{agent_name}/rpc`
//! (§6): the JSON-RPC entry point. A `message/send` with
//! `params.stream == true` upgrades the response to newline-delimited
//! JSON-RPC envelopes; everything else is a single envelope.

use std::convert::Infallible;
use std::pin::Pin;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{Stream, StreamExt};
use relay_core::{Agent, Event, RelayError, Task, TaskMessage, TaskMessageUpdate};
use relay_dispatcher::{AuthorizationPort, RpcOutcome};
use relay_storage::StoragePort;
use serde_json::Value;

use crate::rpc_wire::{parse_rpc_request, RpcRequestBody, RpcResponseBody};
use crate::state::AppState;

pub async fn rpc_by_id<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RpcRequestBody>,
) -> Response
where
    Agents: StoragePort<Agent> + Clone + Send + Sync + 'static,
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
    Messages: StoragePort<TaskMessage> + Clone + Send + Sync + 'static,
    Events: StoragePort<Event> + Send + Sync + 'static,
    Authz: AuthorizationPort + Send + Sync + 'static,
{
    dispatch(state, Some(agent_id), None, headers, body).await
}

pub async fn rpc_by_name<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(agent_name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RpcRequestBody>,
) -> Response
where
    Agents: StoragePort<Agent> + Clone + Send + Sync + 'static,
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
    Messages: StoragePort<TaskMessage> + Clone + Send + Sync + 'static,
    Events: StoragePort<Event> + Send + Sync + 'static,
    Authz: AuthorizationPort + Send + Sync + 'static,
{
    dispatch(state, None, Some(agent_name), headers, body).await
}

async fn dispatch<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    state: AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>,
    agent_id: Option<String>,
    agent_name: Option<String>,
    headers: HeaderMap,
    body: RpcRequestBody,
) -> Response
where
    Agents: StoragePort<Agent> + Clone + Send + Sync + 'static,
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
    Messages: StoragePort<TaskMessage> + Clone + Send + Sync + 'static,
    Events: StoragePort<Event> + Send + Sync + 'static,
    Authz: AuthorizationPort + Send + Sync + 'static,
{
    let id = body.id.clone();

    let (method, params) = match parse_rpc_request(&body.method, body.params) {
        None => return Json(RpcResponseBody::method_not_found(id, &body.method)).into_response(),
        Some(Err(e)) => {
            let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
            return (status, Json(RpcResponseBody::from_relay_error(id, &e))).into_response();
        }
        Some(Ok(pair)) => pair,
    };

    let header_pairs = header_pairs(&headers);

    let outcome = state
        .dispatcher
        .handle_rpc_request(method, params, agent_id.as_deref(), agent_name.as_deref(), &header_pairs)
        .await;

    match outcome {
        Ok(RpcOutcome::Task(task)) => {
            state.publish_task_event(task.clone());
            Json(RpcResponseBody::ok(id, serde_json::to_value(task).unwrap_or(Value::Null))).into_response()
        }
        Ok(RpcOutcome::Event(event)) => {
            Json(RpcResponseBody::ok(id, serde_json::to_value(event).unwrap_or(Value::Null))).into_response()
        }
        Ok(RpcOutcome::Messages(messages)) => {
            if let Some(task_id) = messages.first().map(|m| m.task_id.clone()) {
                refresh_and_publish(&state, &task_id).await;
            }
            Json(RpcResponseBody::ok(id, serde_json::to_value(messages).unwrap_or(Value::Null))).into_response()
        }
        Ok(RpcOutcome::Stream(inner)) => stream_response(state, id, inner).await,
        Err(e) => {
            let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(RpcResponseBody::from_relay_error(id, &e))).into_response()
        }
    }
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

async fn refresh_and_publish<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    state: &AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>,
    task_id: &str,
) where
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
{
    if let Ok(task) = state.tasks.get(Some(task_id), None).await {
        state.publish_task_event(task);
    }
}

fn update_task_id(update: &TaskMessageUpdate) -> Option<String> {
    match update {
        TaskMessageUpdate::Start { parent_task_message, .. }
        | TaskMessageUpdate::Delta { parent_task_message, .. }
        | TaskMessageUpdate::Full { parent_task_message, .. }
        | TaskMessageUpdate::Done { parent_task_message, .. } => {
            parent_task_message.as_ref().map(|t| t.task_id.clone())
        }
    }
}

/// Each line is a full `{id, result, error}` envelope (§6); the id is
/// repeated across every line of one response. On the first
/// `Err(RelayError)` the error is emitted as its own line and the
/// stream ends, matching C5's own "close the stream on every exit
/// path" contract one layer up.
async fn stream_response<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    state: AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>,
    id: Value,
    mut inner: Pin<Box<dyn Stream<Item = Result<TaskMessageUpdate, RelayError>> + Send>>,
) -> Response
where
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
{
    let body_stream = async_stream::stream! {
        let mut seen_task_id: Option<String> = None;
        while let Some(item) = inner.next().await {
            match item {
                Ok(update) => {
                    if seen_task_id.is_none() {
                        seen_task_id = update_task_id(&update);
                    }
                    let envelope = RpcResponseBody::ok(id.clone(), serde_json::to_value(&update).unwrap_or(Value::Null));
                    yield line(&envelope);
                }
                Err(e) => {
                    let envelope = RpcResponseBody::from_relay_error(id.clone(), &e);
                    yield line(&envelope);
                    break;
                }
            }
        }
        if let Some(task_id) = seen_task_id {
            refresh_and_publish(&state, &task_id).await;
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, "application/x-ndjson")
        .header(axum::http::header::CACHE_CONTROL, "no-cache")
        .header(axum::http::header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn line(envelope: &RpcResponseBody) -> Result<Bytes, Infallible> {
    let mut bytes = serde_json::to_vec(envelope).unwrap_or_default();
    bytes.push(b'\n');
    Ok(Bytes::from(bytes))
}
