//! Conversation messages in wire order.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::tool_types::ShellCallParams;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One block inside a message.
///
/// Tool results travel in user messages; tool uses in assistant messages.
/// A `tool_result` must echo the `id` of the `tool_use` it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
    /// Legacy shell call form; either `call_id` or `id` must be present.
    LocalShellCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        action: ShellCallParams,
    },
    /// Free-form tool call carrying raw, non-JSON input.
    CustomToolCall {
        id: String,
        name: String,
        input: String,
    },
}

/// A message in the session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn system_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// A user message carrying only tool results.
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: blocks,
        }
    }

    /// Concatenated text of all `Text` blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Ids of every tool-call block (modern and legacy), in order.
    pub fn tool_use_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                ContentBlock::CustomToolCall { id, .. } => Some(id.as_str()),
                ContentBlock::LocalShellCall { id, call_id, .. } => {
                    call_id.as_deref().or(id.as_deref())
                }
                _ => None,
            })
            .collect()
    }

    /// Ids answered by every `tool_result` block, in order.
    pub fn tool_result_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Approximate wire size in bytes, used by the token meter.
    pub fn byte_len(&self) -> usize {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.len(),
                ContentBlock::ToolUse { id, name, input } => {
                    id.len() + name.len() + input.to_string().len()
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => tool_use_id.len() + content.len(),
                ContentBlock::LocalShellCall { action, .. } => {
                    action.command.iter().map(String::len).sum::<usize>()
                }
                ContentBlock::CustomToolCall { id, name, input } => {
                    id.len() + name.len() + input.len()
                }
            })
            .sum()
    }
}

#[cfg(test)]
#[path = "message.test.rs"]
mod tests;
