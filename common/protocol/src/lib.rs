//! Wire-level types for the crucible agent core.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//! - conversation messages and their content blocks
//! - tool specs, payloads, calls, and outputs
//! - the shell result envelope
//! - session events surfaced to the host
//! - telemetry records
//! - the data shapes exchanged with MCP servers

mod event;
mod mcp;
mod message;
mod spec;
mod telemetry;
mod tool_types;

pub use event::SessionEvent;
pub use mcp::CallToolResult;
pub use mcp::McpContent;
pub use mcp::McpToolInfo;
pub use message::ContentBlock;
pub use message::Message;
pub use message::Role;
pub use spec::ParamSchema;
pub use spec::SchemaError;
pub use spec::ToolSpec;
pub use spec::sanitize_schema;
pub use telemetry::TelemetryEvent;
pub use tool_types::ExecEnvelope;
pub use tool_types::ExecMetadata;
pub use tool_types::ShellCallParams;
pub use tool_types::ToolCall;
pub use tool_types::ToolOutput;
pub use tool_types::ToolPayload;
