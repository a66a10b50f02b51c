// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Axum application state: the dispatcher plus the handful of
//! repositories and collaborators the HTTP layer needs directly (task
//! listing, the generic state store, agent lookup for forwarding) and
//! can't reach through `RpcDispatcher`'s narrow public surface.
//!
//! `states` is typed concretely as [`DualRepository`] rather than a bare
//! `StoragePort<StateEntry>` — the `/states*` endpoints are the one
//! surface that exposes the `storage_backend` per-call phase override
//! (§6), and that override is a `DualRepository` method, not part of
//! the trait every other field is kept generic over.

use std::sync::Arc;

use relay_acp::AgentApiKeyStore;
use relay_core::{Agent, Event, StateEntry, Task, TaskMessage};
use relay_dispatcher::{AuthorizationPort, RpcDispatcher};
use relay_storage::StoragePort;
use relay_storage_dual::DualRepository;
use tokio::sync::broadcast;

/// Published on `task_events` whenever an RPC outcome leaves a task row
/// changed, so `/streams/tasks/{id}` subscribers see it without polling.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub task: Task,
}

pub struct AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary> {
    pub(crate) dispatcher: Arc<RpcDispatcher<Agents, Tasks, Messages, Events, Authz>>,
    pub(crate) agents: Agents,
    pub(crate) tasks: Tasks,
    pub(crate) states: DualRepository<StateEntry, StatesPrimary, StatesSecondary>,
    pub(crate) api_keys: Arc<dyn AgentApiKeyStore>,
    pub(crate) forward_http: reqwest::Client,
    pub(crate) correlation_header: String,
    pub(crate) task_events: broadcast::Sender<TaskEvent>,
}

impl<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary> Clone
    for AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>
where
    Agents: Clone,
    Tasks: Clone,
    StatesPrimary: Clone,
    StatesSecondary: Clone,
{
    fn clone(&self) -> Self {
        AppState {
            dispatcher: self.dispatcher.clone(),
            agents: self.agents.clone(),
            tasks: self.tasks.clone(),
            states: self.states.clone(),
            api_keys: self.api_keys.clone(),
            forward_http: self.forward_http.clone(),
            correlation_header: self.correlation_header.clone(),
            task_events: self.task_events.clone(),
        }
    }
}

impl<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>
    AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>
where
    Agents: StoragePort<Agent> + Clone + Send + Sync + 'static,
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
    Messages: StoragePort<TaskMessage> + Clone + Send + Sync + 'static,
    Events: StoragePort<Event> + Send + Sync + 'static,
    Authz: AuthorizationPort + Send + Sync + 'static,
    StatesPrimary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
    StatesSecondary: StoragePort<StateEntry> + Clone + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dispatcher: Arc<RpcDispatcher<Agents, Tasks, Messages, Events, Authz>>,
        agents: Agents,
        tasks: Tasks,
        states: DualRepository<StateEntry, StatesPrimary, StatesSecondary>,
        api_keys: Arc<dyn AgentApiKeyStore>,
        forward_http: reqwest::Client,
        correlation_header: String,
    ) -> Self {
        let (task_events, _) = broadcast::channel(1024);
        AppState {
            dispatcher,
            agents,
            tasks,
            states,
            api_keys,
            forward_http,
            correlation_header,
            task_events,
        }
    }
}

impl<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>
    AppState<Agents, Tasks, Messages, Events, Authz, StatesPrimary, StatesSecondary>
{
    /// Publish a task change for SSE subscribers. Lagging/closed
    /// channels are not an error here; a broadcast with zero receivers
    /// just drops the event. Kept bound-free so streaming handlers that
    /// only touch `tasks`/`task_events` don't have to carry the full
    /// repository bound set.
    pub(crate) fn publish_task_event(&self, task: Task) {
        let _ = self.task_events.send(TaskEvent { task });
    }

    pub(crate) fn subscribe_task_events(&self) -> broadcast::Receiver<TaskEvent> {
        self.task_events.subscribe()
    }
}
