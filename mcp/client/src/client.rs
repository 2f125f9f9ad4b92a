//! The client contract the pool manages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crucible_config::McpServerConfig;
use crucible_protocol::CallToolResult;
use crucible_protocol::McpToolInfo;
use futures::future::BoxFuture;
use snafu::Snafu;

/// MCP failures as seen by the core.
#[derive(Debug, Clone, Snafu)]
pub enum McpError {
    /// No `[[mcp.definitions]]` entry for the requested server.
    #[snafu(display("unknown MCP server: {server}"))]
    UnknownServer { server: String },

    /// The transport failed; the pool treats the client as unhealthy.
    #[snafu(display("MCP transport error on {server}: {message}"))]
    Transport { server: String, message: String },

    /// The factory could not produce a connected client.
    #[snafu(display("failed to start MCP server {server}: {message}"))]
    Spawn { server: String, message: String },
}

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// A connected MCP server.
///
/// Calls to a single server are serialized by the implementation unless it
/// multiplexes internally.
#[async_trait]
pub trait McpClient: Send + Sync {
    /// Tools this server advertises.
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>>;

    /// Invoke one tool.
    async fn call_tool(&self, tool: &str, arguments: serde_json::Value) -> Result<CallToolResult>;

    /// Terminate the server, waiting up to `grace` before forcing.
    async fn shutdown(&self, grace: Duration);
}

/// Produces a connected client for a server definition. Supplied by the
/// host; the pool calls it outside its own lock.
pub type ClientFactory =
    Arc<dyn Fn(McpServerConfig) -> BoxFuture<'static, Result<Arc<dyn McpClient>>> + Send + Sync>;
