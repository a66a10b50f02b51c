// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `/states*` (§6): a generic named key/value slot, CRUD'd the same way
//! as every other entity but addressable only by `name`. The one
//! surface where callers can override the dual-repository phase
//! per-call via `?storage_backend=` (§4.4, §6), since everything else
//! goes through the dispatcher's own fixed phase.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use relay_core::{RelayError, StateEntry, StoragePhase};
use relay_storage::StoragePort;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PhaseQuery {
    pub storage_backend: Option<String>,
}

impl PhaseQuery {
    fn phase(&self) -> Result<Option<StoragePhase>, RelayError> {
        match &self.storage_backend {
            None => Ok(None),
            Some(raw) => StoragePhase::parse_override(raw)
                .map(Some)
                .ok_or_else(|| RelayError::ClientError(format!("unknown storage_backend: {raw}"))),
        }
    }
}

pub async fn list_states<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
) -> Result<Json<Vec<StateEntry>>, ApiError>
where
    StatesPrimary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
    StatesSecondary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
{
    let entries = state.states.list(None, None, None, None, None).await.map_err(RelayError::from)?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct CreateStateBody {
    pub name: String,
    pub value: Value,
}

pub async fn create_state<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Query(query): Query<PhaseQuery>,
    Json(body): Json<CreateStateBody>,
) -> Result<Json<StateEntry>, ApiError>
where
    StatesPrimary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
    StatesSecondary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
{
    let phase = query.phase()?;
    let now = Utc::now();
    let entry = StateEntry { id: Uuid::new_v4().to_string(), name: body.name, value: body.value, created_at: now, updated_at: now };
    let created = state.states.create_with_phase(phase, entry).await.map_err(RelayError::from)?;
    Ok(Json(created))
}

pub async fn get_state<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(id): Path<String>,
    Query(query): Query<PhaseQuery>,
) -> Result<Json<StateEntry>, ApiError>
where
    StatesPrimary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
    StatesSecondary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
{
    let phase = query.phase()?;
    let entry = state.states.get_with_phase(phase, Some(&id), None).await.map_err(RelayError::from)?;
    Ok(Json(entry))
}

pub async fn get_state_by_name<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(name): Path<String>,
    Query(query): Query<PhaseQuery>,
) -> Result<Json<StateEntry>, ApiError>
where
    StatesPrimary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
    StatesSecondary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
{
    let phase = query.phase()?;
    let entry = state.states.get_with_phase(phase, None, Some(&name)).await.map_err(RelayError::from)?;
    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStateBody {
    pub value: Value,
}

pub async fn update_state<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(id): Path<String>,
    Query(query): Query<PhaseQuery>,
    Json(body): Json<UpdateStateBody>,
) -> Result<Json<StateEntry>, ApiError>
where
    StatesPrimary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
    StatesSecondary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
{
    let phase = query.phase()?;
    let mut entry = state.states.get_with_phase(phase, Some(&id), None).await.map_err(RelayError::from)?;
    entry.value = body.value;
    let updated = state.states.update_with_phase(phase, entry).await.map_err(RelayError::from)?;
    Ok(Json(updated))
}

pub async fn delete_state<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(id): Path<String>,
    Query(query): Query<PhaseQuery>,
) -> Result<Json<Value>, ApiError>
where
    StatesPrimary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
    StatesSecondary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
{
    let phase = query.phase()?;
    let deleted = state.states.delete_with_phase(phase, &id).await.map_err(RelayError::from)?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
