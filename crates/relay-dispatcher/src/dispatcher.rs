// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `RpcDispatcher` — the entry point for `handle_rpc_request` (§4.6):
//! resolves the target agent, authorizes the call, then dispatches to one
//! of `task/create`, `message/send`, `task/cancel`, `event/send`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use relay_acp::{AcpClient, AdvisoryLockRegistry, AgentApiKeyStore};
use relay_core::content::TaskMessageContent;
use relay_core::entities::StreamingStatus;
use relay_core::{
    Agent, AcpType, Event, RelayError, RpcMethod, Task, TaskMessage, TaskMessageUpdate, TaskStatus,
};
use relay_storage::{StorageError, StoragePort};
use serde_json::Value;

use crate::accumulator::DeltaAccumulator;
use crate::authorization::{AuthorizationPort, Operation, Resource};
use crate::params::{
    CancelTaskParams, CreateTaskParams, RpcOutcome, RpcParams, SendEventParams, SendMessageParams,
};
use crate::stream_assembly::assemble_stream;

pub struct RpcDispatcher<Agents, Tasks, Messages, Events, Authz> {
    agents: Agents,
    tasks: Tasks,
    messages: Messages,
    events: Events,
    authz: Authz,
    acp: AcpClient,
    locks: AdvisoryLockRegistry,
    api_keys: Arc<dyn AgentApiKeyStore>,
}

impl<Agents, Tasks, Messages, Events, Authz> RpcDispatcher<Agents, Tasks, Messages, Events, Authz>
where
    Agents: StoragePort<Agent> + Send + Sync + 'static,
    Tasks: StoragePort<Task> + Clone + Send + Sync + 'static,
    Messages: StoragePort<TaskMessage> + Clone + Send + Sync + 'static,
    Events: StoragePort<Event> + Send + Sync + 'static,
    Authz: AuthorizationPort + Send + Sync + 'static,
{
    pub fn new(
        agents: Agents,
        tasks: Tasks,
        messages: Messages,
        events: Events,
        authz: Authz,
        acp: AcpClient,
        locks: AdvisoryLockRegistry,
        api_keys: Arc<dyn AgentApiKeyStore>,
    ) -> Self {
        RpcDispatcher {
            agents,
            tasks,
            messages,
            events,
            authz,
            acp,
            locks,
            api_keys,
        }
    }

    /// §4.6 steps 1-3: resolve the agent, validate the method against its
    /// `acp_type`, run the authorization pre-check, then dispatch.
    pub async fn handle_rpc_request(
        &self,
        method: RpcMethod,
        params: RpcParams,
        agent_id: Option<&str>,
        agent_name: Option<&str>,
        request_headers: &[(String, String)],
    ) -> Result<RpcOutcome, RelayError> {
        if params.method() != method {
            return Err(RelayError::ClientError(format!(
                "params do not match method {}",
                method.as_str()
            )));
        }

        let agent = self.agents.get(agent_id, agent_name).await?;
        if agent.acp_url.is_empty() {
            return Err(RelayError::ClientError(format!(
                "agent {} does not have an acp url configured",
                agent.id
            )));
        }
        if !method.allowed_for(agent.acp_type) {
            return Err(RelayError::ClientError(format!(
                "method {} is not allowed for acp type {:?}",
                method.as_str(),
                agent.acp_type
            )));
        }

        let (task_id, task_name) = match &params {
            RpcParams::TaskCreate(_) => (None, None),
            RpcParams::MessageSend(p) => (p.task_id.as_deref(), p.task_name.as_deref()),
            RpcParams::TaskCancel(p) => (p.task_id.as_deref(), p.task_name.as_deref()),
            RpcParams::EventSend(p) => (p.task_id.as_deref(), p.task_name.as_deref()),
        };
        self.authorize(method, task_id, task_name).await?;

        match params {
            RpcParams::TaskCreate(p) => Ok(RpcOutcome::Task(self.handle_task_create(&agent, p).await?)),
            RpcParams::MessageSend(p) => self.handle_message_send(agent, p).await,
            RpcParams::TaskCancel(p) => Ok(RpcOutcome::Task(self.handle_task_cancel(&agent, p).await?)),
            RpcParams::EventSend(p) => Ok(RpcOutcome::Event(
                self.handle_event_send(&agent, p, request_headers).await?,
            )),
        }
    }

    /// §4.6 step 2.
    async fn authorize(
        &self,
        method: RpcMethod,
        task_id: Option<&str>,
        task_name: Option<&str>,
    ) -> Result<(), RelayError> {
        if method == RpcMethod::TaskCreate {
            return self.authz.check(&Resource::TaskWildcard, Operation::Create).await;
        }

        if let Some(id) = task_id {
            return self.authz.check(&Resource::Task(id.to_string()), Operation::Execute).await;
        }
        if let Some(name) = task_name {
            return match self.tasks.get(None, Some(name)).await {
                Ok(task) => self.authz.check(&Resource::Task(task.id), Operation::Execute).await,
                Err(StorageError::NotFound(_)) => {
                    self.authz.check(&Resource::TaskWildcard, Operation::Create).await
                }
                Err(e) => Err(e.into()),
            };
        }

        // Neither identifier: only message/send may fall back to
        // creating a fresh task; event/send and task/cancel require one.
        if method == RpcMethod::MessageSend {
            self.authz.check(&Resource::TaskWildcard, Operation::Create).await
        } else {
            Err(RelayError::ClientError(format!(
                "{} requires a task_id or task_name",
                method.as_str()
            )))
        }
    }

    async fn get_or_create_task(
        &self,
        agent: &Agent,
        task_id: Option<&str>,
        task_name: Option<&str>,
        task_params: Option<Value>,
    ) -> Result<Task, RelayError> {
        let existing = if let Some(id) = task_id {
            Some(self.tasks.get(Some(id), None).await?)
        } else if let Some(name) = task_name {
            match self.tasks.get(None, Some(name)).await {
                Ok(task) => Some(task),
                Err(StorageError::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        if let Some(mut task) = existing {
            if let Some(params) = task_params {
                if task.params.as_ref() != Some(&params) {
                    tracing::info!(task_id = %task.id, "updating task params");
                    task.params = Some(params);
                    task = self.tasks.update(task).await?;
                }
            }
            return Ok(task);
        }

        let now = Utc::now();
        let created = self
            .tasks
            .create(Task {
                id: String::new(),
                name: task_name.map(|s| s.to_string()),
                agent_id: agent.id.clone(),
                status: TaskStatus::Running,
                status_reason: None,
                params: task_params,
                task_metadata: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
        tracing::info!(agent_id = %agent.id, task_id = %created.id, "created task");
        self.authz.grant(Resource::Task(created.id.clone())).await?;
        Ok(created)
    }

    /// Mark the task FAILED at most once and swallow the persistence
    /// error (the caller's original error is what matters, §7).
    async fn fail_task(&self, mut task: Task, reason: &str) {
        if task.status.is_terminal() {
            return;
        }
        task.transition(TaskStatus::Failed, Some(reason.to_string()));
        if let Err(e) = self.tasks.update(task).await {
            tracing::warn!(error = %e, "failed to persist task FAILED status");
        }
    }

    /// §4.6.1.
    async fn handle_task_create(&self, agent: &Agent, params: CreateTaskParams) -> Result<Task, RelayError> {
        let task = self
            .get_or_create_task(agent, None, params.name.as_deref(), params.params.clone())
            .await?;

        if agent.acp_type == AcpType::Agentic {
            let api_key = self.api_keys.lookup(&agent.id).await;
            let forward = self
                .acp
                .call_sync(
                    &agent.acp_url,
                    RpcMethod::TaskCreate.as_str(),
                    &task.id,
                    params.params.clone().unwrap_or(Value::Null),
                    api_key.as_deref(),
                    None,
                )
                .await;
            if let Err(e) = forward {
                self.fail_task(task, &e.to_string()).await;
                return Err(RelayError::service(e));
            }
        }
        Ok(task)
    }

    /// §4.6.2.
    async fn handle_message_send(&self, agent: Agent, params: SendMessageParams) -> Result<RpcOutcome, RelayError> {
        if params.stream {
            self.handle_message_send_stream(agent, params).await
        } else {
            Ok(RpcOutcome::Messages(self.handle_message_send_sync(agent, params).await?))
        }
    }

    async fn open_acp_message_stream(
        &self,
        agent: &Agent,
        task: &Task,
        content: &TaskMessageContent,
    ) -> Result<
        std::pin::Pin<Box<dyn futures::Stream<Item = Result<Value, relay_acp::AcpError>> + Send>>,
        RelayError,
    > {
        let api_key = self.api_keys.lookup(&agent.id).await;
        let params = serde_json::json!({ "content": content, "stream": true });
        let stream = self
            .acp
            .call_stream(&agent.acp_url, RpcMethod::MessageSend.as_str(), &task.id, params, api_key.as_deref(), None)
            .await
            .map_err(RelayError::service)?;
        Ok(stream.boxed())
    }

    /// Synchronous sub-path (§4.6.2): drive the ACP stream to completion
    /// without emitting per-chunk updates or writing intermediate rows —
    /// only the final per-index content is persisted, in one batch.
    async fn handle_message_send_sync(&self, agent: Agent, params: SendMessageParams) -> Result<Vec<TaskMessage>, RelayError> {
        let task = self
            .get_or_create_task(&agent, params.task_id.as_deref(), params.task_name.as_deref(), params.task_params)
            .await?;

        self.append_message(&task.id, params.content.clone(), None).await?;

        let guard = self
            .locks
            .try_acquire(&agent.id, &task.id)
            .map_err(|_| RelayError::ClientError("message/send already in progress for this task".into()))?;

        let mut raw = self.open_acp_message_stream(&agent, &task, &params.content).await?;

        let mut accumulators: HashMap<u32, DeltaAccumulator> = HashMap::new();
        let mut content_by_index: HashMap<u32, TaskMessageContent> = HashMap::new();
        let mut order: Vec<u32> = Vec::new();

        let drive = async {
            while let Some(item) = raw.next().await {
                let value = item.map_err(RelayError::service)?;
                let update: TaskMessageUpdate = serde_json::from_value(value)
                    .map_err(|e| RelayError::ClientError(format!("malformed task message update: {e}")))?;
                let index = update.index();
                if content_by_index.contains_key(&index) {
                    continue;
                }
                if !order.contains(&index) {
                    order.push(index);
                }
                match update {
                    TaskMessageUpdate::Full { content, .. } => {
                        content_by_index.insert(index, content);
                    }
                    TaskMessageUpdate::Start { .. } => {}
                    TaskMessageUpdate::Delta { delta, .. } => {
                        accumulators.entry(index).or_default().add_delta(delta)?;
                    }
                    TaskMessageUpdate::Done { .. } => {
                        if let Some(acc) = accumulators.get(&index) {
                            if !acc.is_empty() {
                                content_by_index.insert(index, acc.flush()?);
                            }
                        }
                    }
                }
            }
            Ok::<(), RelayError>(())
        }
        .await;

        drop(guard);

        if let Err(e) = drive {
            self.fail_task(task, &e.to_string()).await;
            return Err(e);
        }

        // Flush any index that only ever saw deltas and never an
        // explicit DONE/FULL (§4.6.2: "flush each index's accumulator
        // to a final content value").
        for index in &order {
            if !content_by_index.contains_key(index) {
                if let Some(acc) = accumulators.get(index) {
                    if !acc.is_empty() {
                        content_by_index.insert(*index, acc.flush()?);
                    }
                }
            }
        }

        let contents: Vec<TaskMessageContent> = order
            .into_iter()
            .filter_map(|i| content_by_index.remove(&i))
            .collect();

        if contents.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let messages: Vec<TaskMessage> = contents
            .into_iter()
            .map(|content| TaskMessage {
                id: String::new(),
                task_id: task.id.clone(),
                content,
                streaming_status: Some(StreamingStatus::Done),
                created_at: now,
                updated_at: now,
            })
            .collect();

        Ok(self.messages.batch_create(messages).await?)
    }

    /// Streaming sub-path (§4.6.2): persist caller input, then return
    /// the live assembled stream to the caller.
    async fn handle_message_send_stream(&self, agent: Agent, params: SendMessageParams) -> Result<RpcOutcome, RelayError> {
        let task = self
            .get_or_create_task(&agent, params.task_id.as_deref(), params.task_name.as_deref(), params.task_params)
            .await?;

        self.append_message(&task.id, params.content.clone(), Some(StreamingStatus::Done)).await?;

        let guard = self
            .locks
            .try_acquire(&agent.id, &task.id)
            .map_err(|_| RelayError::ClientError("message/send already in progress for this task".into()))?;

        let raw = self.open_acp_message_stream(&agent, &task, &params.content).await?;
        let assembled = assemble_stream(task, self.tasks.clone(), self.messages.clone(), raw, guard);
        Ok(RpcOutcome::Stream(Box::pin(assembled)))
    }

    async fn append_message(
        &self,
        task_id: &str,
        content: TaskMessageContent,
        streaming_status: Option<StreamingStatus>,
    ) -> Result<TaskMessage, RelayError> {
        let now = Utc::now();
        Ok(self
            .messages
            .create(TaskMessage {
                id: String::new(),
                task_id: task_id.to_string(),
                content,
                streaming_status,
                created_at: now,
                updated_at: now,
            })
            .await?)
    }

    /// §4.6.3.
    async fn handle_task_cancel(&self, agent: &Agent, params: CancelTaskParams) -> Result<Task, RelayError> {
        let mut task = self.tasks.get(params.task_id.as_deref(), params.task_name.as_deref()).await?;

        if task.status == TaskStatus::Canceled {
            return Ok(task);
        }

        let api_key = self.api_keys.lookup(&agent.id).await;
        self.acp
            .call_sync(&agent.acp_url, RpcMethod::TaskCancel.as_str(), &task.id, Value::Null, api_key.as_deref(), None)
            .await
            .map_err(RelayError::service)?;

        task.transition(TaskStatus::Canceled, Some("Task canceled by user".to_string()));
        Ok(self.tasks.update(task).await?)
    }

    /// §4.6.4.
    async fn handle_event_send(
        &self,
        agent: &Agent,
        params: SendEventParams,
        request_headers: &[(String, String)],
    ) -> Result<Event, RelayError> {
        if params.task_id.is_none() && params.task_name.is_none() {
            return Err(RelayError::ClientError("either task_id or task_name must be provided".into()));
        }
        let task = self.tasks.get(params.task_id.as_deref(), params.task_name.as_deref()).await?;

        let now = Utc::now();
        let event = self
            .events
            .create(Event {
                id: String::new(),
                task_id: task.id.clone(),
                agent_id: agent.id.clone(),
                content: params.content.clone(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        let api_key = self.api_keys.lookup(&agent.id).await;
        let overlay: Vec<(&str, String)> = api_key
            .as_deref()
            .map(|k| vec![("x-agent-api-key", k.to_string())])
            .unwrap_or_default();
        let forwardable = relay_acp::headers::filter_for_forwarding(
            request_headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            overlay,
        );

        self.acp
            .call_sync_with_headers(
                &agent.acp_url,
                RpcMethod::EventSend.as_str(),
                &task.id,
                params.content,
                api_key.as_deref(),
                None,
                &forwardable,
            )
            .await
            .map_err(RelayError::service)?;

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::AllowAllAuthorization;
    use relay_core::content::{MessageAuthor, TextContent};
    use relay_core::AgentStatus;
    use relay_storage::{Filter, OrderDirection};
    use std::sync::Arc;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Clone)]
    struct FakeAgents {
        agents: Arc<Mutex<Vec<Agent>>>,
    }

    #[async_trait::async_trait]
    impl StoragePort<Agent> for FakeAgents {
        async fn create(&self, item: Agent) -> Result<Agent, StorageError> {
            self.agents.lock().unwrap().push(item.clone());
            Ok(item)
        }
        async fn batch_create(&self, items: Vec<Agent>) -> Result<Vec<Agent>, StorageError> {
            Ok(items)
        }
        async fn get(&self, id: Option<&str>, name: Option<&str>) -> Result<Agent, StorageError> {
            let agents = self.agents.lock().unwrap();
            agents
                .iter()
                .find(|a| Some(a.id.as_str()) == id || Some(a.name.as_str()) == name)
                .cloned()
                .ok_or_else(|| StorageError::NotFound("agent not found".into()))
        }
        async fn get_by_field(&self, _f: &str, _v: &serde_json::Value) -> Result<Option<Agent>, StorageError> {
            Ok(None)
        }
        async fn find_by_field(&self, _f: &str, _v: &serde_json::Value, _l: u64, _p: Option<u64>, _s: Option<&str>, _filters: Option<&[Filter]>) -> Result<Vec<Agent>, StorageError> {
            Ok(vec![])
        }
        async fn find_by_field_with_cursor(&self, _f: &str, _v: &serde_json::Value, _l: u64, _s: Option<&str>, _b: Option<&str>, _a: Option<&str>, _filters: Option<&[Filter]>) -> Result<Vec<Agent>, StorageError> {
            Ok(vec![])
        }
        async fn update(&self, item: Agent) -> Result<Agent, StorageError> {
            Ok(item)
        }
        async fn batch_update(&self, items: Vec<Agent>) -> Result<Vec<Agent>, StorageError> {
            Ok(items)
        }
        async fn delete(&self, _id: &str) -> Result<u64, StorageError> {
            Ok(1)
        }
        async fn batch_delete(&self, ids: &[String]) -> Result<u64, StorageError> {
            Ok(ids.len() as u64)
        }
        async fn delete_by_field(&self, _f: &str, _v: &serde_json::Value) -> Result<u64, StorageError> {
            Ok(1)
        }
        async fn list(&self, _filters: Option<&[Filter]>, _limit: Option<u64>, _page: Option<u64>, _order_by: Option<&str>, _order_direction: Option<OrderDirection>) -> Result<Vec<Agent>, StorageError> {
            Ok(self.agents.lock().unwrap().clone())
        }
    }

    #[derive(Clone, Default)]
    struct FakeTasks {
        tasks: Arc<Mutex<Vec<Task>>>,
    }

    #[async_trait::async_trait]
    impl StoragePort<Task> for FakeTasks {
        async fn create(&self, mut item: Task) -> Result<Task, StorageError> {
            item.id = format!("t-{}", self.tasks.lock().unwrap().len() + 1);
            self.tasks.lock().unwrap().push(item.clone());
            Ok(item)
        }
        async fn batch_create(&self, items: Vec<Task>) -> Result<Vec<Task>, StorageError> {
            Ok(items)
        }
        async fn get(&self, id: Option<&str>, name: Option<&str>) -> Result<Task, StorageError> {
            let tasks = self.tasks.lock().unwrap();
            tasks
                .iter()
                .find(|t| {
                    (id.is_some() && Some(t.id.as_str()) == id)
                        || (name.is_some() && t.name.as_deref() == name)
                })
                .cloned()
                .ok_or_else(|| StorageError::NotFound("task not found".into()))
        }
        async fn get_by_field(&self, _f: &str, _v: &serde_json::Value) -> Result<Option<Task>, StorageError> {
            Ok(None)
        }
        async fn find_by_field(&self, _f: &str, _v: &serde_json::Value, _l: u64, _p: Option<u64>, _s: Option<&str>, _filters: Option<&[Filter]>) -> Result<Vec<Task>, StorageError> {
            Ok(vec![])
        }
        async fn find_by_field_with_cursor(&self, _f: &str, _v: &serde_json::Value, _l: u64, _s: Option<&str>, _b: Option<&str>, _a: Option<&str>, _filters: Option<&[Filter]>) -> Result<Vec<Task>, StorageError> {
            Ok(vec![])
        }
        async fn update(&self, item: Task) -> Result<Task, StorageError> {
            let mut tasks = self.tasks.lock().unwrap();
            if let Some(existing) = tasks.iter_mut().find(|t| t.id == item.id) {
                *existing = item.clone();
            }
            Ok(item)
        }
        async fn batch_update(&self, items: Vec<Task>) -> Result<Vec<Task>, StorageError> {
            Ok(items)
        }
        async fn delete(&self, _id: &str) -> Result<u64, StorageError> {
            Ok(1)
        }
        async fn batch_delete(&self, ids: &[String]) -> Result<u64, StorageError> {
            Ok(ids.len() as u64)
        }
        async fn delete_by_field(&self, _f: &str, _v: &serde_json::Value) -> Result<u64, StorageError> {
            Ok(1)
        }
        async fn list(&self, _filters: Option<&[Filter]>, _limit: Option<u64>, _page: Option<u64>, _order_by: Option<&str>, _order_direction: Option<OrderDirection>) -> Result<Vec<Task>, StorageError> {
            Ok(self.tasks.lock().unwrap().clone())
        }
    }

    #[derive(Clone, Default)]
    struct FakeMessages {
        messages: Arc<Mutex<Vec<TaskMessage>>>,
    }

    #[async_trait::async_trait]
    impl StoragePort<TaskMessage> for FakeMessages {
        async fn create(&self, mut item: TaskMessage) -> Result<TaskMessage, StorageError> {
            item.id = format!("m-{}", self.messages.lock().unwrap().len() + 1);
            self.messages.lock().unwrap().push(item.clone());
            Ok(item)
        }
        async fn batch_create(&self, items: Vec<TaskMessage>) -> Result<Vec<TaskMessage>, StorageError> {
            for i in &items {
                self.messages.lock().unwrap().push(i.clone());
            }
            Ok(items)
        }
        async fn get(&self, id: Option<&str>, _name: Option<&str>) -> Result<TaskMessage, StorageError> {
            let id = id.unwrap_or_default();
            self.messages
                .lock()
                .unwrap()
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(id.to_string()))
        }
        async fn get_by_field(&self, _f: &str, _v: &serde_json::Value) -> Result<Option<TaskMessage>, StorageError> {
            Ok(None)
        }
        async fn find_by_field(&self, _f: &str, _v: &serde_json::Value, _l: u64, _p: Option<u64>, _s: Option<&str>, _filters: Option<&[Filter]>) -> Result<Vec<TaskMessage>, StorageError> {
            Ok(vec![])
        }
        async fn find_by_field_with_cursor(&self, _f: &str, _v: &serde_json::Value, _l: u64, _s: Option<&str>, _b: Option<&str>, _a: Option<&str>, _filters: Option<&[Filter]>) -> Result<Vec<TaskMessage>, StorageError> {
            Ok(vec![])
        }
        async fn update(&self, item: TaskMessage) -> Result<TaskMessage, StorageError> {
            Ok(item)
        }
        async fn batch_update(&self, items: Vec<TaskMessage>) -> Result<Vec<TaskMessage>, StorageError> {
            Ok(items)
        }
        async fn delete(&self, _id: &str) -> Result<u64, StorageError> {
            Ok(1)
        }
        async fn batch_delete(&self, ids: &[String]) -> Result<u64, StorageError> {
            Ok(ids.len() as u64)
        }
        async fn delete_by_field(&self, _f: &str, _v: &serde_json::Value) -> Result<u64, StorageError> {
            Ok(1)
        }
        async fn list(&self, _filters: Option<&[Filter]>, _limit: Option<u64>, _page: Option<u64>, _order_by: Option<&str>, _order_direction: Option<OrderDirection>) -> Result<Vec<TaskMessage>, StorageError> {
            Ok(self.messages.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct FakeEvents;

    #[async_trait::async_trait]
    impl StoragePort<Event> for FakeEvents {
        async fn create(&self, item: Event) -> Result<Event, StorageError> {
            Ok(item)
        }
        async fn batch_create(&self, items: Vec<Event>) -> Result<Vec<Event>, StorageError> {
            Ok(items)
        }
        async fn get(&self, _id: Option<&str>, _name: Option<&str>) -> Result<Event, StorageError> {
            Err(StorageError::NotFound("events are not looked up by id in these tests".into()))
        }
        async fn get_by_field(&self, _f: &str, _v: &serde_json::Value) -> Result<Option<Event>, StorageError> {
            Ok(None)
        }
        async fn find_by_field(&self, _f: &str, _v: &serde_json::Value, _l: u64, _p: Option<u64>, _s: Option<&str>, _filters: Option<&[Filter]>) -> Result<Vec<Event>, StorageError> {
            Ok(vec![])
        }
        async fn find_by_field_with_cursor(&self, _f: &str, _v: &serde_json::Value, _l: u64, _s: Option<&str>, _b: Option<&str>, _a: Option<&str>, _filters: Option<&[Filter]>) -> Result<Vec<Event>, StorageError> {
            Ok(vec![])
        }
        async fn update(&self, item: Event) -> Result<Event, StorageError> {
            Ok(item)
        }
        async fn batch_update(&self, items: Vec<Event>) -> Result<Vec<Event>, StorageError> {
            Ok(items)
        }
        async fn delete(&self, _id: &str) -> Result<u64, StorageError> {
            Ok(1)
        }
        async fn batch_delete(&self, ids: &[String]) -> Result<u64, StorageError> {
            Ok(ids.len() as u64)
        }
        async fn delete_by_field(&self, _f: &str, _v: &serde_json::Value) -> Result<u64, StorageError> {
            Ok(1)
        }
        async fn list(&self, _filters: Option<&[Filter]>, _limit: Option<u64>, _page: Option<u64>, _order_by: Option<&str>, _order_direction: Option<OrderDirection>) -> Result<Vec<Event>, StorageError> {
            Ok(vec![])
        }
    }

    struct NoApiKeys;

    #[async_trait::async_trait]
    impl AgentApiKeyStore for NoApiKeys {
        async fn lookup(&self, _agent_id: &str) -> Option<String> {
            None
        }
    }

    fn agent(id: &str, acp_url: &str, acp_type: AcpType) -> Agent {
        Agent {
            id: id.to_string(),
            name: format!("agent-{id}"),
            description: None,
            acp_url: acp_url.to_string(),
            acp_type,
            status: AgentStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn text_content(s: &str) -> TaskMessageContent {
        TaskMessageContent::Text(TextContent { author: MessageAuthor::User, content: s.to_string() })
    }

    fn dispatcher(
        agents: FakeAgents,
        tasks: FakeTasks,
        messages: FakeMessages,
    ) -> RpcDispatcher<FakeAgents, FakeTasks, FakeMessages, FakeEvents, AllowAllAuthorization> {
        RpcDispatcher::new(
            agents,
            tasks,
            messages,
            FakeEvents,
            AllowAllAuthorization,
            AcpClient::new(std::time::Duration::from_secs(1), std::time::Duration::from_secs(1)).unwrap(),
            AdvisoryLockRegistry::new(true),
            Arc::new(NoApiKeys),
        )
    }

    #[tokio::test]
    async fn task_create_for_sync_agent_never_forwards() {
        let a = agent("a1", "http://unreachable.invalid", AcpType::Sync);
        let agents = FakeAgents { agents: Arc::new(Mutex::new(vec![a.clone()])) };
        let d = dispatcher(agents, FakeTasks::default(), FakeMessages::default());
        let outcome = d
            .handle_rpc_request(
                RpcMethod::TaskCreate,
                RpcParams::TaskCreate(CreateTaskParams::default()),
                Some("a1"),
                None,
                &[],
            )
            .await;
        assert!(outcome.is_err(), "sync agents do not accept task/create");
    }

    #[tokio::test]
    async fn task_create_forwards_for_agentic_agent_and_returns_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": "task/create-t-1",
                "result": {}
            })))
            .mount(&server)
            .await;

        let a = agent("a1", &server.uri(), AcpType::Agentic);
        let agents = FakeAgents { agents: Arc::new(Mutex::new(vec![a.clone()])) };
        let d = dispatcher(agents, FakeTasks::default(), FakeMessages::default());
        let outcome = d
            .handle_rpc_request(
                RpcMethod::TaskCreate,
                RpcParams::TaskCreate(CreateTaskParams { name: Some("job".into()), params: None }),
                Some("a1"),
                None,
                &[],
            )
            .await
            .unwrap();
        match outcome {
            RpcOutcome::Task(t) => {
                assert_eq!(t.name.as_deref(), Some("job"));
                assert_eq!(t.status, TaskStatus::Running);
            }
            _ => panic!("expected a task outcome"),
        }
    }

    #[tokio::test]
    async fn task_create_forward_failure_marks_task_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let a = agent("a1", &server.uri(), AcpType::Agentic);
        let agents = FakeAgents { agents: Arc::new(Mutex::new(vec![a.clone()])) };
        let tasks = FakeTasks::default();
        let d = dispatcher(agents, tasks.clone(), FakeMessages::default());
        let err = d
            .handle_rpc_request(
                RpcMethod::TaskCreate,
                RpcParams::TaskCreate(CreateTaskParams::default()),
                Some("a1"),
                None,
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ServiceError(_)));
        let stored = tasks.tasks.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn message_send_sync_batches_final_content_without_intermediate_rows() {
        let server = MockServer::start().await;
        let body = format!(
            "{}\n{}\n",
            serde_json::json!({
                "jsonrpc": "2.0", "id": "message/send-t-1",
                "result": {"type": "delta", "index": 0, "delta": {"type": "text", "text_delta": "he"}}
            }),
            serde_json::json!({
                "jsonrpc": "2.0", "id": "message/send-t-1",
                "result": {"type": "delta", "index": 0, "delta": {"type": "text", "text_delta": "llo"}}
            }),
        );
        Mock::given(method("POST"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let a = agent("a1", &server.uri(), AcpType::Agentic);
        let agents = FakeAgents { agents: Arc::new(Mutex::new(vec![a.clone()])) };
        let messages = FakeMessages::default();
        let d = dispatcher(agents, FakeTasks::default(), messages.clone());
        let outcome = d
            .handle_rpc_request(
                RpcMethod::MessageSend,
                RpcParams::MessageSend(SendMessageParams {
                    task_id: None,
                    task_name: Some("job".into()),
                    task_params: None,
                    content: text_content("hi"),
                    stream: false,
                }),
                Some("a1"),
                None,
                &[],
            )
            .await
            .unwrap();
        match outcome {
            RpcOutcome::Messages(msgs) => {
                assert_eq!(msgs.len(), 1);
                match &msgs[0].content {
                    TaskMessageContent::Text(c) => assert_eq!(c.content, "hello"),
                    _ => panic!("expected text content"),
                }
            }
            _ => panic!("expected a messages outcome"),
        }
        // the caller's input message plus the one assembled agent reply
        assert_eq!(messages.messages.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn task_cancel_on_already_canceled_task_is_a_no_op() {
        let a = agent("a1", "http://unreachable.invalid", AcpType::Agentic);
        let agents = FakeAgents { agents: Arc::new(Mutex::new(vec![a.clone()])) };
        let tasks = FakeTasks::default();
        let mut canceled = Task {
            id: "t-1".to_string(),
            name: None,
            agent_id: "a1".to_string(),
            status: TaskStatus::Running,
            status_reason: None,
            params: None,
            task_metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        canceled.transition(TaskStatus::Canceled, Some("already done".into()));
        tasks.tasks.lock().unwrap().push(canceled);
        let d = dispatcher(agents, tasks, FakeMessages::default());
        let outcome = d
            .handle_rpc_request(
                RpcMethod::TaskCancel,
                RpcParams::TaskCancel(CancelTaskParams { task_id: Some("t-1".into()), task_name: None }),
                Some("a1"),
                None,
                &[],
            )
            .await
            .unwrap();
        match outcome {
            RpcOutcome::Task(t) => assert_eq!(t.status, TaskStatus::Canceled),
            _ => panic!("expected a task outcome"),
        }
    }

    #[tokio::test]
    async fn event_send_requires_a_task_identifier() {
        let a = agent("a1", "http://unreachable.invalid", AcpType::Agentic);
        let agents = FakeAgents { agents: Arc::new(Mutex::new(vec![a.clone()])) };
        let d = dispatcher(agents, FakeTasks::default(), FakeMessages::default());
        let err = d
            .handle_rpc_request(
                RpcMethod::EventSend,
                RpcParams::EventSend(SendEventParams { task_id: None, task_name: None, content: serde_json::json!({}) }),
                Some("a1"),
                None,
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ClientError(_)));
    }
}
