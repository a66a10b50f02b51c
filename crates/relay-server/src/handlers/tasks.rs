// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `/tasks*` (§6): read/delete/metadata-update endpoints outside RPC
//! dispatch. Listing a task has no side effects, so it bypasses
//! `RpcDispatcher` entirely and talks straight to the `tasks` port.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use relay_core::{Agent, Task};
use relay_storage::{Filter, OrderDirection, StoragePort};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub limit: Option<u64>,
    pub page_number: Option<u64>,
    pub order_by: Option<String>,
    pub order_direction: Option<OrderDirection>,
}

pub async fn list_tasks<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, ApiError>
where
    Agents: StoragePort<Agent> + Clone + Send + Sync + 'static,
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
{
    let mut fields = HashMap::new();
    if let Some(agent_id) = query.agent_id {
        fields.insert("agent_id".to_string(), json!(agent_id));
    }
    // `agent_name` isn't a task column; resolve it to an id first so the
    // filter can still run against `agent_id` like every other case.
    if let Some(agent_name) = query.agent_name {
        match state.agents.get(None, Some(&agent_name)).await {
            Ok(agent) => {
                fields.insert("agent_id".to_string(), json!(agent.id));
            }
            Err(_) => return Ok(Json(Vec::new())),
        }
    }
    let filters = if fields.is_empty() { None } else { Some(vec![Filter::include(fields)]) };

    let tasks = state
        .tasks
        .list(
            filters.as_deref(),
            query.limit,
            query.page_number,
            query.order_by.as_deref(),
            query.order_direction,
        )
        .await
        .map_err(relay_core::RelayError::from)?;
    Ok(Json(tasks))
}

pub async fn get_task<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError>
where
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
{
    let task = state.tasks.get(Some(&id), None).await.map_err(relay_core::RelayError::from)?;
    Ok(Json(task))
}

pub async fn get_task_by_name<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(name): Path<String>,
) -> Result<Json<Task>, ApiError>
where
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
{
    let task = state.tasks.get(None, Some(&name)).await.map_err(relay_core::RelayError::from)?;
    Ok(Json(task))
}

pub async fn delete_task<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
{
    let deleted = state.tasks.delete(&id).await.map_err(relay_core::RelayError::from)?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn delete_task_by_name<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
{
    let task = state.tasks.get(None, Some(&name)).await.map_err(relay_core::RelayError::from)?;
    let deleted = state.tasks.delete(&task.id).await.map_err(relay_core::RelayError::from)?;
    Ok(Json(json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskMetadataBody {
    pub task_metadata: Value,
}

/// `PUT /tasks/{id}` only ever touches `task_metadata` (§6); every other
/// field is owned by the RPC lifecycle, not the REST surface.
pub async fn update_task<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTaskMetadataBody>,
) -> Result<Json<Task>, ApiError>
where
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
{
    let mut task = state.tasks.get(Some(&id), None).await.map_err(relay_core::RelayError::from)?;
    task.task_metadata = Some(body.task_metadata);
    let updated = state.tasks.update(task).await.map_err(relay_core::RelayError::from)?;
    state.publish_task_event(updated.clone());
    Ok(Json(updated))
}
