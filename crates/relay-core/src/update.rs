// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Wire shape of the per-chunk updates an agent streams back for
//! `message/send` (§4.6.2). Produced by the ACP proxy (C5, one frame per
//! NDJSON line) and consumed by the streaming assembly engine
//! (relay-dispatcher, C6), which is itself a lazy producer of the same
//! element type for its own caller.

use serde::{Deserialize, Serialize};

use crate::content::{TaskMessageContent, TaskMessageDelta};
use crate::entities::TaskMessage;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskMessageUpdate {
    Start {
        index: u32,
        content: TaskMessageContent,
        #[serde(default)]
        parent_task_message: Option<TaskMessage>,
    },
    Delta {
        index: u32,
        delta: TaskMessageDelta,
        #[serde(default)]
        parent_task_message: Option<TaskMessage>,
    },
    Full {
        index: u32,
        content: TaskMessageContent,
        #[serde(default)]
        parent_task_message: Option<TaskMessage>,
    },
    Done {
        index: u32,
        #[serde(default)]
        parent_task_message: Option<TaskMessage>,
    },
}

impl TaskMessageUpdate {
    pub fn index(&self) -> u32 {
        match self {
            TaskMessageUpdate::Start { index, .. }
            | TaskMessageUpdate::Delta { index, .. }
            | TaskMessageUpdate::Full { index, .. }
            | TaskMessageUpdate::Done { index, .. } => *index,
        }
    }

    /// Attach the persisted parent message once the assembler knows it,
    /// for echoing back to the caller (§4.6.2 step 4).
    pub fn with_parent(mut self, parent: TaskMessage) -> Self {
        match &mut self {
            TaskMessageUpdate::Start { parent_task_message, .. }
            | TaskMessageUpdate::Delta { parent_task_message, .. }
            | TaskMessageUpdate::Full { parent_task_message, .. }
            | TaskMessageUpdate::Done { parent_task_message, .. } => {
                *parent_task_message = Some(parent);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MessageAuthor, TextContent};

    #[test]
    fn index_is_readable_across_variants() {
        let u = TaskMessageUpdate::Done {
            index: 3,
            parent_task_message: None,
        };
        assert_eq!(u.index(), 3);
    }

    #[test]
    fn with_parent_attaches_to_any_variant() {
        let parent = TaskMessage {
            id: "m-1".into(),
            task_id: "t-1".into(),
            content: TaskMessageContent::Text(TextContent {
                author: MessageAuthor::Agent,
                content: String::new(),
            }),
            streaming_status: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let u = TaskMessageUpdate::Start {
            index: 0,
            content: TaskMessageContent::Text(TextContent {
                author: MessageAuthor::Agent,
                content: String::new(),
            }),
            parent_task_message: None,
        }
        .with_parent(parent.clone());
        match u {
            TaskMessageUpdate::Start { parent_task_message, .. } => {
                assert_eq!(parent_task_message.unwrap().id, "m-1");
            }
            _ => panic!("expected start variant"),
        }
    }
}
