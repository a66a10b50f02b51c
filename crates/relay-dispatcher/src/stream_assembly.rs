// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The streaming sub-path of `message/send` (§4.6.2): a lazy consumer of
//! the ACP proxy's update stream that is itself a lazy producer of the
//! same element type for its caller, folding `START`/`DELTA`/`FULL`/`DONE`
//! chunks into persisted `TaskMessage` rows as they arrive.

use std::collections::HashMap;

use chrono::Utc;
use futures::Stream;
use relay_acp::AdvisoryLockGuard;
use relay_core::content::TaskMessageContent;
use relay_core::entities::StreamingStatus;
use relay_core::{RelayError, Task, TaskMessage, TaskMessageUpdate, TaskStatus};
use relay_storage::StoragePort;

use crate::accumulator::{initial_content_from_delta, DeltaAccumulator};

struct IndexState {
    parent: Option<TaskMessage>,
    accumulator: DeltaAccumulator,
    completed: bool,
}

impl Default for IndexState {
    fn default() -> Self {
        IndexState {
            parent: None,
            accumulator: DeltaAccumulator::new(),
            completed: false,
        }
    }
}

struct AssemblyState<Tasks, Messages, S> {
    task: Task,
    tasks: Tasks,
    messages: Messages,
    inner: S,
    indexes: HashMap<u32, IndexState>,
    pending: std::collections::VecDeque<TaskMessageUpdate>,
    finished: bool,
    failed: bool,
    /// Held for as long as the stream is alive; dropped (releasing the
    /// lock) when the stream itself is dropped, on every exit path.
    _lock: AdvisoryLockGuard,
}

impl<Tasks, Messages, S> AssemblyState<Tasks, Messages, S>
where
    Tasks: StoragePort<Task> + Send + Sync + 'static,
    Messages: StoragePort<TaskMessage> + Send + Sync + 'static,
    S: Stream<Item = Result<serde_json::Value, relay_acp::AcpError>> + Unpin + Send,
{
    async fn create_parent(&mut self, index: u32, content: TaskMessageContent) -> Result<TaskMessage, RelayError> {
        if let Some(existing) = self.indexes.get(&index).and_then(|s| s.parent.clone()) {
            return Ok(existing);
        }
        let now = Utc::now();
        let message = TaskMessage {
            id: String::new(),
            task_id: self.task.id.clone(),
            content,
            streaming_status: Some(StreamingStatus::InProgress),
            created_at: now,
            updated_at: now,
        };
        let created = self.messages.create(message).await?;
        self.indexes.entry(index).or_default().parent = Some(created.clone());
        Ok(created)
    }

    async fn finalize_parent(&mut self, index: u32, content: TaskMessageContent) -> Result<TaskMessage, RelayError> {
        if let Some(mut parent) = self.indexes.get(&index).and_then(|s| s.parent.clone()) {
            parent.content = content;
            parent.streaming_status = Some(StreamingStatus::Done);
            parent.updated_at = Utc::now();
            let updated = self.messages.update(parent).await?;
            self.indexes.entry(index).or_default().parent = Some(updated.clone());
            Ok(updated)
        } else {
            self.create_parent(index, content).await
        }
    }

    /// Flush index's accumulator if it has unflushed deltas; idempotent
    /// once the index is marked completed (§4.6.2 step 5).
    async fn flush_index(&mut self, index: u32) -> Result<(), RelayError> {
        let Some(state) = self.indexes.get(&index) else {
            return Ok(());
        };
        if state.completed || state.accumulator.is_empty() {
            return Ok(());
        }
        let content = state.accumulator.flush()?;
        self.finalize_parent(index, content).await?;
        self.indexes.entry(index).or_default().completed = true;
        Ok(())
    }

    async fn handle_update(&mut self, update: TaskMessageUpdate) -> Result<(), RelayError> {
        let index = update.index();
        if self.indexes.get(&index).map(|s| s.completed).unwrap_or(false) {
            return Ok(());
        }
        self.indexes.entry(index).or_default();

        match update {
            TaskMessageUpdate::Start { content, .. } => {
                let parent = self.create_parent(index, content.clone()).await?;
                self.pending.push_back(
                    TaskMessageUpdate::Start { index, content, parent_task_message: None }.with_parent(parent),
                );
            }
            TaskMessageUpdate::Delta { delta, .. } => {
                let had_parent = self.indexes.get(&index).and_then(|s| s.parent.clone());
                if had_parent.is_none() {
                    let initial = initial_content_from_delta(&delta);
                    let parent = self.create_parent(index, initial.clone()).await?;
                    self.pending.push_back(
                        TaskMessageUpdate::Start { index, content: initial, parent_task_message: None }
                            .with_parent(parent),
                    );
                }
                self.indexes.entry(index).or_default().accumulator.add_delta(delta.clone())?;
                let parent = self.indexes.get(&index).and_then(|s| s.parent.clone());
                let mut out = TaskMessageUpdate::Delta { index, delta, parent_task_message: None };
                if let Some(parent) = parent {
                    out = out.with_parent(parent);
                }
                self.pending.push_back(out);
            }
            TaskMessageUpdate::Full { content, .. } => {
                let parent = self.finalize_parent(index, content.clone()).await?;
                self.indexes.entry(index).or_default().completed = true;
                self.pending.push_back(
                    TaskMessageUpdate::Full { index, content, parent_task_message: None }.with_parent(parent),
                );
            }
            TaskMessageUpdate::Done { .. } => {
                self.flush_index(index).await?;
                self.indexes.entry(index).or_default().completed = true;
                let parent = self.indexes.get(&index).and_then(|s| s.parent.clone());
                let mut out = TaskMessageUpdate::Done { index, parent_task_message: None };
                if let Some(parent) = parent {
                    out = out.with_parent(parent);
                }
                self.pending.push_back(out);
            }
        }
        Ok(())
    }

    async fn flush_remaining(&mut self) -> Result<(), RelayError> {
        let indexes: Vec<u32> = self.indexes.keys().copied().collect();
        for index in indexes {
            self.flush_index(index).await?;
        }
        Ok(())
    }

    async fn fail(&mut self, reason: &str) {
        if self.failed {
            return;
        }
        self.failed = true;
        self.task.transition(TaskStatus::Failed, Some(reason.to_string()));
        if let Err(e) = self.tasks.update(self.task.clone()).await {
            tracing::warn!(error = %e, task_id = %self.task.id, "failed to persist task FAILED status");
        }
    }
}

/// Build the caller-visible stream for `message/send(stream=true)`. The
/// advisory lock guard's lifetime is tied to the returned stream: it is
/// released whenever the stream is dropped, whether by exhaustion, error,
/// or the caller abandoning it early.
pub fn assemble_stream<Tasks, Messages, S>(
    task: Task,
    tasks: Tasks,
    messages: Messages,
    inner: S,
    lock: AdvisoryLockGuard,
) -> impl Stream<Item = Result<TaskMessageUpdate, RelayError>> + Send
where
    Tasks: StoragePort<Task> + Send + Sync + 'static,
    Messages: StoragePort<TaskMessage> + Send + Sync + 'static,
    S: Stream<Item = Result<serde_json::Value, relay_acp::AcpError>> + Unpin + Send + 'static,
{
    use futures::StreamExt;

    let state = AssemblyState {
        task,
        tasks,
        messages,
        inner,
        indexes: HashMap::new(),
        pending: std::collections::VecDeque::new(),
        finished: false,
        failed: false,
        _lock: lock,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((Ok(item), state));
            }
            if state.finished {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(value)) => {
                    let update: TaskMessageUpdate = match serde_json::from_value(value) {
                        Ok(u) => u,
                        Err(e) => {
                            let msg = format!("malformed task message update: {e}");
                            state.fail(&msg).await;
                            state.finished = true;
                            return Some((Err(RelayError::ClientError(msg)), state));
                        }
                    };
                    if let Err(e) = state.handle_update(update).await {
                        state.fail(&e.to_string()).await;
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
                Some(Err(e)) => {
                    state.fail(&e.to_string()).await;
                    state.finished = true;
                    return Some((Err(RelayError::service(e)), state));
                }
                None => {
                    if let Err(e) = state.flush_remaining().await {
                        state.fail(&e.to_string()).await;
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                    state.finished = true;
                }
            }
        }
    })
}
