//! The handler contract every tool family implements.

use async_trait::async_trait;
use crucible_protocol::ToolOutput;
use crucible_protocol::ToolPayload;

use crate::context::ToolInvocation;
use crate::error::Result;

/// Payload family a handler serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Function,
    UnifiedExec,
    Mcp,
    LocalShell,
    Custom,
}

/// One tool family's execution capability.
///
/// Handlers are stateless and reentrant; any per-call state lives in the
/// invocation. They must decode their own raw arguments, consult the
/// execution policy before side effects, hold tracker locks only around
/// mutations, and check the cancellation token at reasonable granularity.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Whether this handler can serve the given payload. The default
    /// accepts exactly the handler's own kind; handlers that serve several
    /// wire forms (shell) override this.
    fn matches_kind(&self, payload: &ToolPayload) -> bool {
        matches!(
            (self.kind(), payload),
            (ToolKind::Function, ToolPayload::Function { .. })
                | (ToolKind::UnifiedExec, ToolPayload::UnifiedExec { .. })
                | (ToolKind::Mcp, ToolPayload::Mcp { .. })
                | (ToolKind::LocalShell, ToolPayload::LocalShell { .. })
                | (ToolKind::Custom, ToolPayload::Custom { .. })
        )
    }

    /// Perform the invocation and return the output delivered to the model.
    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput>;
}

#[cfg(test)]
#[path = "handler.test.rs"]
mod tests;
