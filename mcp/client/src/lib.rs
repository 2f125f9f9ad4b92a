//! Pooled access to MCP servers.
//!
//! The stdio transport that actually talks to a server lives outside the
//! core; hosts hand the pool a factory that produces connected clients.
//! The pool owns health, TTL/idle eviction, and graceful shutdown.

mod client;
mod names;
mod pool;

pub use client::ClientFactory;
pub use client::McpClient;
pub use client::McpError;
pub use client::Result;
pub use names::mcp_tool_name;
pub use names::parse_mcp_tool_name;
pub use pool::McpPool;
