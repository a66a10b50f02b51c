// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `GET /streams/tasks/{id}` (§6): server-sent events fed by the
//! `task_events` broadcast channel. Grounded on `sven-gateway`'s
//! websocket handler (`tokio::select!` against a `broadcast::Receiver`,
//! `Lagged`/`Closed` handled explicitly) adapted from a bidirectional
//! socket to a one-way SSE feed.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use relay_core::Task;
use relay_storage::StoragePort;
use tokio::sync::broadcast;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn stream_task<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>(
    State(state): State<AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError>
where
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
{
    // Fail fast if the task doesn't exist rather than opening a stream
    // that will just sit there forever.
    state.tasks.get(Some(&task_id), None).await.map_err(relay_core::RelayError::from)?;

    let receiver = state.subscribe_task_events();
    let sse = Sse::new(event_stream(task_id, receiver)).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(15)).text(":ping"),
    );
    Ok(sse.into_response())
}

fn event_stream(
    task_id: String,
    mut receiver: broadcast::Receiver<crate::state::TaskEvent>,
) -> impl Stream<Item = Result<SseEvent, std::convert::Infallible>> {
    async_stream::stream! {
        yield Ok(SseEvent::default()
            .event("connected")
            .data(serde_json::json!({ "type": "connected", "taskId": task_id }).to_string()));

        loop {
            match receiver.recv().await {
                Ok(event) if event.task.id == task_id => {
                    let payload = serde_json::json!({ "type": "task_updated", "task": event.task });
                    yield Ok(SseEvent::default().event("task_updated").data(payload.to_string()));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
