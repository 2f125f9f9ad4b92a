//! Forwarding calls to pooled MCP clients.

use async_trait::async_trait;
use crucible_mcp::McpError;
use crucible_protocol::ToolOutput;
use crucible_protocol::ToolPayload;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::context::ToolInvocation;
use crate::error::Result;
use crate::error::tool_error;
use crate::handler::ToolHandler;
use crate::handler::ToolKind;

/// Handler for `server/tool` calls.
///
/// On a transport failure the pooled client is marked unhealthy, a fresh
/// client is requested, and the call retried exactly once. The registry
/// itself never retries.
pub struct McpHandler;

#[async_trait]
impl ToolHandler for McpHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Mcp
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let (server, tool, raw_arguments) = match &invocation.payload {
            ToolPayload::Mcp {
                server,
                tool,
                raw_arguments,
            } => (server.clone(), tool.clone(), raw_arguments.clone()),
            other => {
                return Err(tool_error::ValidationSnafu {
                    message: format!("mcp handler cannot serve a {} payload", other.tag()),
                }
                .build());
            }
        };

        let arguments: Value = if raw_arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&raw_arguments)?
        };

        let pool = &invocation.turn.mcp;
        let client = pool.get_client(&server).await.map_err(map_pool_error)?;

        match client.call_tool(&tool, arguments.clone()).await {
            Ok(result) => Ok(ToolOutput::Mcp { result }),
            Err(McpError::Transport { message, .. }) => {
                warn!(server = %server, tool = %tool, %message, "MCP transport error; retrying once");
                pool.mark_unhealthy(&server).await;
                let client = pool.get_client(&server).await.map_err(map_pool_error)?;
                match client.call_tool(&tool, arguments).await {
                    Ok(result) => {
                        debug!(server = %server, tool = %tool, "MCP retry succeeded");
                        Ok(ToolOutput::Mcp { result })
                    }
                    Err(err) => Err(tool_error::TransientSnafu {
                        message: format!("MCP call failed after retry: {err}"),
                    }
                    .build()),
                }
            }
            Err(err) => Err(map_pool_error(err)),
        }
    }
}

fn map_pool_error(err: McpError) -> crate::error::ToolError {
    match err {
        McpError::UnknownServer { server } => tool_error::NotFoundSnafu {
            message: format!("unknown MCP server: {server}"),
        }
        .build(),
        McpError::Spawn { server, message } => tool_error::TransientSnafu {
            message: format!("could not start MCP server {server}: {message}"),
        }
        .build(),
        McpError::Transport { server, message } => tool_error::TransientSnafu {
            message: format!("MCP transport error on {server}: {message}"),
        }
        .build(),
    }
}

#[cfg(test)]
#[path = "mcp.test.rs"]
mod tests;
