// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Per-index delta accumulation (§4.6.2). Mirrors the original
//! `DeltaAccumulator`: deltas for one message index must share a single
//! delta type, and flushing concatenates them into the matching
//! `TaskMessageContent` variant.

use relay_core::content::{
    DataContent, DeltaKind, ReasoningContent, TaskMessageContent, TaskMessageDelta,
    TextContent, ToolRequestContent, ToolResponseContent,
};
use relay_core::content::MessageAuthor;
use relay_core::RelayError;

#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    kind: Option<DeltaKind>,
    deltas: Vec<TaskMessageDelta>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        DeltaAccumulator::default()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Record one delta, rejecting a mix of delta types for this index
    /// (§4.6.2: "mixing two delta types for a single index is a client
    /// error").
    pub fn add_delta(&mut self, delta: TaskMessageDelta) -> Result<(), RelayError> {
        let kind = delta.kind();
        match self.kind {
            None => self.kind = Some(kind),
            Some(existing) if existing != kind => {
                return Err(RelayError::ClientError(format!(
                    "delta type mismatch: {existing:?} != {kind:?}"
                )));
            }
            _ => {}
        }
        self.deltas.push(delta);
        Ok(())
    }

    /// Concatenate accumulated deltas into the final content for this
    /// index (§4.6.2 "accumulator flush rules per delta type").
    pub fn flush(&self) -> Result<TaskMessageContent, RelayError> {
        let kind = self
            .kind
            .ok_or_else(|| RelayError::ClientError("nothing accumulated to flush".into()))?;

        match kind {
            DeltaKind::Text => {
                let content = self
                    .deltas
                    .iter()
                    .map(|d| match d {
                        TaskMessageDelta::Text { text_delta } => text_delta.as_str(),
                        _ => unreachable!("accumulator enforces a single delta kind"),
                    })
                    .collect::<String>();
                Ok(TaskMessageContent::Text(TextContent {
                    author: MessageAuthor::Agent,
                    content,
                }))
            }
            DeltaKind::Data => {
                let raw = self
                    .deltas
                    .iter()
                    .map(|d| match d {
                        TaskMessageDelta::Data { data_delta } => data_delta.as_str(),
                        _ => unreachable!("accumulator enforces a single delta kind"),
                    })
                    .collect::<String>();
                let data = serde_json::from_str(&raw).map_err(|_| {
                    RelayError::ClientError(format!("accumulated data content is not valid JSON: {raw}"))
                })?;
                Ok(TaskMessageContent::Data(DataContent {
                    author: MessageAuthor::Agent,
                    data,
                }))
            }
            DeltaKind::ToolRequest => {
                let (tool_call_id, name) = self.first_tool_identifiers()?;
                let raw = self
                    .deltas
                    .iter()
                    .map(|d| match d {
                        TaskMessageDelta::ToolRequest { arguments_delta, .. } => {
                            arguments_delta.as_str()
                        }
                        _ => unreachable!("accumulator enforces a single delta kind"),
                    })
                    .collect::<String>();
                let arguments = serde_json::from_str(&raw).map_err(|_| {
                    RelayError::ClientError(format!(
                        "accumulated tool request arguments is not valid JSON: {raw}"
                    ))
                })?;
                Ok(TaskMessageContent::ToolRequest(ToolRequestContent {
                    author: MessageAuthor::Agent,
                    tool_call_id,
                    name,
                    arguments,
                }))
            }
            DeltaKind::ToolResponse => {
                let (tool_call_id, name) = self.first_tool_identifiers()?;
                let content = self
                    .deltas
                    .iter()
                    .map(|d| match d {
                        TaskMessageDelta::ToolResponse { content_delta, .. } => {
                            content_delta.as_str()
                        }
                        _ => unreachable!("accumulator enforces a single delta kind"),
                    })
                    .collect::<String>();
                Ok(TaskMessageContent::ToolResponse(ToolResponseContent {
                    author: MessageAuthor::Agent,
                    tool_call_id,
                    name,
                    content,
                }))
            }
            DeltaKind::ReasoningContent => {
                let content = self
                    .deltas
                    .iter()
                    .map(|d| match d {
                        TaskMessageDelta::ReasoningContent { content_delta } => {
                            content_delta.as_str()
                        }
                        _ => unreachable!("accumulator enforces a single delta kind"),
                    })
                    .collect::<String>();
                Ok(TaskMessageContent::Reasoning(ReasoningContent {
                    author: MessageAuthor::Agent,
                    content: vec![content],
                    summary: Vec::new(),
                }))
            }
            DeltaKind::ReasoningSummary => {
                let summary = self
                    .deltas
                    .iter()
                    .map(|d| match d {
                        TaskMessageDelta::ReasoningSummary { summary_delta } => {
                            summary_delta.as_str()
                        }
                        _ => unreachable!("accumulator enforces a single delta kind"),
                    })
                    .collect::<String>();
                Ok(TaskMessageContent::Reasoning(ReasoningContent {
                    author: MessageAuthor::Agent,
                    content: Vec::new(),
                    summary: vec![summary],
                }))
            }
        }
    }

    fn first_tool_identifiers(&self) -> Result<(String, String), RelayError> {
        match self.deltas.first() {
            Some(TaskMessageDelta::ToolRequest { tool_call_id, name, .. })
            | Some(TaskMessageDelta::ToolResponse { tool_call_id, name, .. }) => {
                Ok((tool_call_id.clone(), name.clone()))
            }
            _ => Err(RelayError::ClientError("tool delta missing identifiers".into())),
        }
    }
}

/// Synthesize the initial (empty) content for an index whose first
/// inbound update was a `DELTA`, so a `START` can be emitted before it
/// (§4.6.2: "synthesize initial content from the delta type").
pub fn initial_content_from_delta(delta: &TaskMessageDelta) -> TaskMessageContent {
    match delta {
        TaskMessageDelta::Text { .. } => TaskMessageContent::Text(TextContent {
            author: MessageAuthor::Agent,
            content: String::new(),
        }),
        TaskMessageDelta::Data { .. } => TaskMessageContent::Data(DataContent {
            author: MessageAuthor::Agent,
            data: serde_json::Value::Null,
        }),
        TaskMessageDelta::ToolRequest { tool_call_id, name, .. } => {
            TaskMessageContent::ToolRequest(ToolRequestContent {
                author: MessageAuthor::Agent,
                tool_call_id: tool_call_id.clone(),
                name: name.clone(),
                arguments: serde_json::Value::Null,
            })
        }
        TaskMessageDelta::ToolResponse { tool_call_id, name, .. } => {
            TaskMessageContent::ToolResponse(ToolResponseContent {
                author: MessageAuthor::Agent,
                tool_call_id: tool_call_id.clone(),
                name: name.clone(),
                content: String::new(),
            })
        }
        TaskMessageDelta::ReasoningContent { .. } => TaskMessageContent::Reasoning(ReasoningContent {
            author: MessageAuthor::Agent,
            content: Vec::new(),
            summary: Vec::new(),
        }),
        TaskMessageDelta::ReasoningSummary { .. } => TaskMessageContent::Reasoning(ReasoningContent {
            author: MessageAuthor::Agent,
            content: Vec::new(),
            summary: Vec::new(),
        }),
    }
}
