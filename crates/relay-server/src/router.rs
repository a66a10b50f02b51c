// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Route table (§6). Grounded on `sven-gateway::gateway`'s general shape
//! of "construct components, layer the router, serve" — the router
//! body itself has no teacher file to copy since the gateway's own
//! `http::serve` isn't part of the retrieved source, so this is
//! composed from the security/request-id building blocks that are.

use axum::http::HeaderName;
use axum::routing::{get, post};
use axum::Router;
use relay_core::{Agent, Event, StateEntry, Task, TaskMessage};
use relay_dispatcher::AuthorizationPort;
use relay_storage::StoragePort;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::handlers::{forward, rpc, states, stream, tasks};
use crate::middleware::security_headers;
use crate::state::AppState;

#[derive(Clone)]
struct UuidRequestId;

impl tower_http::request_id::MakeRequestId for UuidRequestId {
    fn make_request_id<B>(
        &mut self,
        _request: &axum::http::Request<B>,
    ) -> Option<tower_http::request_id::RequestId> {
        let id = Uuid::new_v4().to_string();
        axum::http::HeaderValue::from_str(&id)
            .ok()
            .map(tower_http::request_id::RequestId::new)
    }
}

pub fn build_router<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    state: AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>,
) -> Router
where
    Agents: StoragePort<Agent> + Clone + Send + Sync + 'static,
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
    Messages: StoragePort<TaskMessage> + Clone + Send + Sync + 'static,
    Events: StoragePort<Event> + Send + Sync + 'static,
    Authz: AuthorizationPort + Send + Sync + 'static,
    StatesPrimary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
    StatesSecondary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
{
    let correlation_header = HeaderName::from_bytes(state.correlation_header.as_bytes())
        .unwrap_or_else(|_| HeaderName::from_static("x-request-id"));

    Router::new()
        .route("/agents/:agent_id/rpc", post(rpc::rpc_by_id))
        .route("/agents/name/:agent_name/rpc", post(rpc::rpc_by_name))
        .route(
            "/agents/forward/name/:agent_name/*path",
            get(forward::forward).post(forward::forward),
        )
        .route("/tasks", get(tasks::list_tasks))
        .route(
            "/tasks/:id",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        )
        .route(
            "/tasks/name/:name",
            get(tasks::get_task_by_name).delete(tasks::delete_task_by_name),
        )
        .route("/states", get(states::list_states).post(states::create_state))
        .route(
            "/states/:id",
            get(states::get_state).put(states::update_state).delete(states::delete_state),
        )
        .route("/states/name/:name", get(states::get_state_by_name))
        .route("/streams/tasks/:id", get(stream::stream_task))
        .layer(axum::middleware::from_fn(security_headers))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(correlation_header.clone()))
        .layer(SetRequestIdLayer::new(correlation_header, UuidRequestId))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
