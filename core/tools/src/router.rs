//! Parsing model response blocks into typed tool calls, and converting
//! dispatch errors into wire results.

use std::sync::Arc;

use crucible_mcp::parse_mcp_tool_name;
use crucible_protocol::ContentBlock;
use crucible_protocol::ToolCall;
use crucible_protocol::ToolPayload;
use crucible_tracker::SharedTurnDiffTracker;
use tracing::debug;

use crate::context::ToolInvocation;
use crate::context::TurnContext;
use crate::error::Result;
use crate::error::ToolError;
use crate::error::tool_error;
use crate::registry::ToolRegistry;
use crate::spec::SpecRegistry;

/// Routes parsed calls into the registry and turns respond-to-model
/// failures into error tool-results.
pub struct ToolRouter {
    specs: Arc<SpecRegistry>,
    registry: ToolRegistry,
}

impl ToolRouter {
    pub fn new(specs: Arc<SpecRegistry>, registry: ToolRegistry) -> Self {
        Self { specs, registry }
    }

    pub fn specs(&self) -> &SpecRegistry {
        &self.specs
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Whether calls to `tool_name` may share the turn's read guard.
    pub fn tool_supports_parallel(&self, tool_name: &str) -> bool {
        self.specs.supports_parallel(tool_name)
    }

    /// Parse one response block into at most one tool call.
    ///
    /// MCP tools are recognized by exactly one `/` in the name. A legacy
    /// `local_shell_call` missing both `call_id` and `id` breaks the wire
    /// contract and is fatal.
    pub fn build_tool_call(&self, block: &ContentBlock) -> Result<Option<ToolCall>> {
        match block {
            ContentBlock::ToolUse { id, name, input } => {
                let raw_arguments = input.to_string();
                let payload = match parse_mcp_tool_name(name) {
                    Some((server, tool)) => ToolPayload::Mcp {
                        server: server.to_string(),
                        tool: tool.to_string(),
                        raw_arguments,
                    },
                    None => ToolPayload::Function { raw_arguments },
                };
                Ok(Some(ToolCall {
                    tool_name: name.clone(),
                    call_id: id.clone(),
                    payload,
                }))
            }
            ContentBlock::LocalShellCall {
                id,
                call_id,
                action,
            } => {
                let call_id = call_id
                    .clone()
                    .or_else(|| id.clone())
                    .ok_or_else(|| {
                        tool_error::ProtocolSnafu {
                            message: "local_shell_call carries neither call_id nor id",
                        }
                        .build()
                    })?;
                Ok(Some(ToolCall {
                    tool_name: "shell".to_string(),
                    call_id,
                    payload: ToolPayload::LocalShell {
                        params: action.clone(),
                    },
                }))
            }
            ContentBlock::CustomToolCall { id, name, input } => Ok(Some(ToolCall {
                tool_name: name.clone(),
                call_id: id.clone(),
                payload: ToolPayload::Custom {
                    name: name.clone(),
                    raw_input: input.clone(),
                },
            })),
            ContentBlock::Text { .. } | ContentBlock::ToolResult { .. } => Ok(None),
        }
    }

    /// Dispatch one call and produce its wire tool-result.
    ///
    /// Respond-to-model failures become an error result carrying the
    /// original `call_id`; fatal failures propagate to abort the turn.
    pub async fn dispatch_tool_call(
        &self,
        turn: Arc<TurnContext>,
        tracker: SharedTurnDiffTracker,
        sub_id: &str,
        call: ToolCall,
    ) -> Result<ContentBlock> {
        let ToolCall {
            tool_name,
            call_id,
            payload,
        } = call;

        let invocation = ToolInvocation {
            turn,
            tracker,
            sub_id: sub_id.to_string(),
            call_id: call_id.clone(),
            tool_name,
            payload,
        };

        match self.registry.dispatch(invocation).await {
            Ok(output) => Ok(output.into_result_block(&call_id)),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                debug!(call_id = %call_id, kind = %err.kind(), "tool call failed; responding to model");
                Ok(error_result(&call_id, &err))
            }
        }
    }
}

/// The wire tool-result for a non-fatal failure.
pub fn error_result(call_id: &str, err: &ToolError) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: call_id.to_string(),
        content: err.to_model_message(),
        is_error: true,
    }
}

#[cfg(test)]
#[path = "router.test.rs"]
mod tests;
