//! Tool dispatch for the crucible agent core.
//!
//! This crate owns the path from a parsed model response to a wire
//! tool-result: spec registration, payload routing, the per-turn
//! reader/writer scheduler, the builtin handler archetypes, and the
//! deterministic output formatter.

pub mod context;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod patch;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod spec;
pub mod telemetry;
pub mod truncate;

pub use context::ToolInvocation;
pub use context::TurnContext;
pub use context::TurnContextBuilder;
pub use error::Result;
pub use error::ToolError;
pub use handler::ToolHandler;
pub use handler::ToolKind;
pub use registry::ToolRegistry;
pub use router::ToolRouter;
pub use runtime::ToolCallRuntime;
pub use spec::SpecRegistry;
pub use telemetry::TelemetrySink;
