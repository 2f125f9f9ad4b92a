//! Builtin handler archetypes.

mod apply_patch;
mod mcp;
mod read_file;
mod shell;
mod write_file;

pub use apply_patch::ApplyPatchHandler;
pub use mcp::McpHandler;
pub use read_file::ReadFileHandler;
pub use shell::ShellHandler;
pub use shell::is_read_only_command;
pub use write_file::WriteFileHandler;

use std::sync::Arc;

use crate::registry::ToolRegistry;

/// Register the builtin handlers under their spec names.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register("shell", Arc::new(ShellHandler));
    registry.register("read_file", Arc::new(ReadFileHandler));
    registry.register("write_file", Arc::new(WriteFileHandler));
    registry.register("apply_patch", Arc::new(ApplyPatchHandler));
}
