// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Tagged content and delta variants (§3, §9 "dynamic polymorphism of
//! content"). Content is what gets persisted; deltas are transit-only
//! fragments the assembly engine (relay-dispatcher) folds into content.
//! Both carry an explicit `type` discriminator on the wire and the
//! dispatcher rejects unknown discriminators rather than coercing them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageAuthor {
    User,
    Agent,
}

/// A single task-message content item. Exactly one variant per message; the
/// variant never changes after creation (only its fields are refreshed as
/// deltas accumulate).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskMessageContent {
    Text(TextContent),
    Data(DataContent),
    ToolRequest(ToolRequestContent),
    ToolResponse(ToolResponseContent),
    Reasoning(ReasoningContent),
}

impl TaskMessageContent {
    pub fn author(&self) -> MessageAuthor {
        match self {
            TaskMessageContent::Text(c) => c.author,
            TaskMessageContent::Data(c) => c.author,
            TaskMessageContent::ToolRequest(c) => c.author,
            TaskMessageContent::ToolResponse(c) => c.author,
            TaskMessageContent::Reasoning(c) => c.author,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub author: MessageAuthor,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataContent {
    pub author: MessageAuthor,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequestContent {
    pub author: MessageAuthor,
    pub tool_call_id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponseContent {
    pub author: MessageAuthor,
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningContent {
    pub author: MessageAuthor,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub summary: Vec<String>,
}

impl Default for MessageAuthor {
    fn default() -> Self {
        MessageAuthor::Agent
    }
}

/// Partial content fragments emitted during streaming (§3 "Delta variants").
/// Never persisted raw; always folded through a `DeltaAccumulator`
/// (relay-dispatcher) into one of the `TaskMessageContent` variants above.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskMessageDelta {
    Text {
        text_delta: String,
    },
    Data {
        data_delta: String,
    },
    ToolRequest {
        tool_call_id: String,
        name: String,
        arguments_delta: String,
    },
    ToolResponse {
        tool_call_id: String,
        name: String,
        content_delta: String,
    },
    ReasoningContent {
        content_delta: String,
    },
    ReasoningSummary {
        summary_delta: String,
    },
}

impl TaskMessageDelta {
    /// Discriminator used by the accumulator to detect delta-type mixing
    /// (§3 invariant: "all deltas in one accumulator share a single delta
    /// type").
    pub fn kind(&self) -> DeltaKind {
        match self {
            TaskMessageDelta::Text { .. } => DeltaKind::Text,
            TaskMessageDelta::Data { .. } => DeltaKind::Data,
            TaskMessageDelta::ToolRequest { .. } => DeltaKind::ToolRequest,
            TaskMessageDelta::ToolResponse { .. } => DeltaKind::ToolResponse,
            TaskMessageDelta::ReasoningContent { .. } => DeltaKind::ReasoningContent,
            TaskMessageDelta::ReasoningSummary { .. } => DeltaKind::ReasoningSummary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaKind {
    Text,
    Data,
    ToolRequest,
    ToolResponse,
    ReasoningContent,
    ReasoningSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_discriminator_round_trips() {
        let c = TaskMessageContent::Text(TextContent {
            author: MessageAuthor::Agent,
            content: "hi".into(),
        });
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "text");
        let back: TaskMessageContent = serde_json::from_value(json).unwrap();
        assert!(matches!(back, TaskMessageContent::Text(_)));
    }

    #[test]
    fn unknown_discriminator_is_rejected() {
        let json = serde_json::json!({"type": "unknown_variant", "author": "AGENT"});
        let result: Result<TaskMessageContent, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
