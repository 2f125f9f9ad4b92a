//! Tool payloads, calls, outputs, and the shell result envelope.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::mcp::CallToolResult;
use crate::message::ContentBlock;

/// Parameters of a legacy `local_shell_call` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellCallParams {
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_escalated_permissions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

/// How a tool call was expressed by the model.
///
/// Routing depends on the variant alone; raw arguments stay unparsed until
/// the owning handler decodes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolPayload {
    Function {
        raw_arguments: String,
    },
    UnifiedExec {
        raw_arguments: String,
    },
    Mcp {
        server: String,
        tool: String,
        raw_arguments: String,
    },
    LocalShell {
        params: ShellCallParams,
    },
    Custom {
        name: String,
        raw_input: String,
    },
}

impl ToolPayload {
    /// A short tag for logging and telemetry.
    pub fn tag(&self) -> &'static str {
        match self {
            ToolPayload::Function { .. } => "function",
            ToolPayload::UnifiedExec { .. } => "unified_exec",
            ToolPayload::Mcp { .. } => "mcp",
            ToolPayload::LocalShell { .. } => "local_shell",
            ToolPayload::Custom { .. } => "custom",
        }
    }

    /// Size of the raw argument text, for telemetry input accounting.
    pub fn input_bytes(&self) -> usize {
        match self {
            ToolPayload::Function { raw_arguments }
            | ToolPayload::UnifiedExec { raw_arguments }
            | ToolPayload::Mcp { raw_arguments, .. } => raw_arguments.len(),
            ToolPayload::LocalShell { params } => {
                params.command.iter().map(String::len).sum::<usize>()
            }
            ToolPayload::Custom { raw_input, .. } => raw_input.len(),
        }
    }
}

/// One tool call parsed out of an assistant message.
///
/// `call_id` is server-issued and opaque; the matching tool-result must
/// carry it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub call_id: String,
    pub payload: ToolPayload,
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutput {
    Function {
        content: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    Mcp {
        result: CallToolResult,
    },
}

impl ToolOutput {
    /// A successful plain-text output.
    pub fn text(content: impl Into<String>) -> Self {
        ToolOutput::Function {
            content: content.into(),
            success: true,
            metadata: None,
        }
    }

    /// A failed plain-text output.
    pub fn error(content: impl Into<String>) -> Self {
        ToolOutput::Function {
            content: content.into(),
            success: false,
            metadata: None,
        }
    }

    /// Attach structured metadata (shell envelopes use this).
    pub fn with_metadata(self, metadata: Value) -> Self {
        match self {
            ToolOutput::Function {
                content, success, ..
            } => ToolOutput::Function {
                content,
                success,
                metadata: Some(metadata),
            },
            other => other,
        }
    }

    pub fn success(&self) -> bool {
        match self {
            ToolOutput::Function { success, .. } => *success,
            ToolOutput::Mcp { result } => !result.is_error,
        }
    }

    /// Rendered text content, whichever variant.
    pub fn content_text(&self) -> String {
        match self {
            ToolOutput::Function { content, .. } => content.clone(),
            ToolOutput::Mcp { result } => result.text(),
        }
    }

    /// Size of the content delivered to the model.
    pub fn output_bytes(&self) -> usize {
        self.content_text().len()
    }

    /// Convert into the wire tool-result block answering `call_id`.
    pub fn into_result_block(self, call_id: &str) -> ContentBlock {
        let is_error = !self.success();
        ContentBlock::ToolResult {
            tool_use_id: call_id.to_string(),
            content: self.content_text(),
            is_error,
        }
    }
}

/// Metadata attached to shell-like tool results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecMetadata {
    pub exit_code: i32,
    pub duration_seconds: f64,
    pub timed_out: bool,
    pub truncated: bool,
}

impl ExecMetadata {
    /// Build metadata rounding the duration to one decimal place.
    pub fn new(
        exit_code: i32,
        duration: std::time::Duration,
        timed_out: bool,
        truncated: bool,
    ) -> Self {
        Self {
            exit_code,
            duration_seconds: (duration.as_secs_f64() * 10.0).round() / 10.0,
            timed_out,
            truncated,
        }
    }
}

/// The structured envelope shell-like tools return to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecEnvelope {
    pub output: String,
    pub metadata: ExecMetadata,
}

impl ExecEnvelope {
    /// Serialize to the wire JSON form.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "output": self.output,
            "metadata": {
                "exit_code": self.metadata.exit_code,
                "duration_seconds": self.metadata.duration_seconds,
                "timed_out": self.metadata.timed_out,
                "truncated": self.metadata.truncated,
            }
        })
    }
}

#[cfg(test)]
#[path = "tool_types.test.rs"]
mod tests;
