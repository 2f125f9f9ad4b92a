//! Tool execution errors.

use crucible_error::ErrorKind;
use crucible_error::Severity;
use snafu::Location;
use snafu::Snafu;

/// Failures produced by handlers, the registry, the router, and the
/// scheduler. Each variant classifies into exactly one [`ErrorKind`]; the
/// registry branches on the kind's severity, never on message text.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module)]
pub enum ToolError {
    /// Malformed or unparseable tool arguments.
    #[snafu(display("invalid arguments: {message}"))]
    Validation {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// A referenced tool, file, or server does not exist.
    #[snafu(display("not found: {message}"))]
    NotFound {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The user or policy denied the operation.
    #[snafu(display("permission denied: {message}"))]
    Permission {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// A pre-image or lock disagreement between handlers.
    #[snafu(display("conflict: {message}"))]
    Conflict {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// A transient failure; the owning handler may retry once.
    #[snafu(display("transient failure: {message}"))]
    Transient {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The operation exceeded its time budget.
    #[snafu(display("timed out after {timeout_ms}ms"))]
    Timeout {
        timeout_ms: u64,
        #[snafu(implicit)]
        location: Location,
    },

    /// The operation was cancelled by an interrupt.
    #[snafu(display("cancelled"))]
    Cancelled {
        #[snafu(implicit)]
        location: Location,
    },

    /// A sandbox rule was violated.
    #[snafu(display("sandbox violation: {message}"))]
    Sandbox {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The host system failed underneath the core.
    #[snafu(display("system error: {message}"))]
    System {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The model or transport broke the wire contract.
    #[snafu(display("protocol error: {message}"))]
    Protocol {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ToolError {
    /// The taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Validation { .. } => ErrorKind::Validation,
            ToolError::NotFound { .. } => ErrorKind::NotFound,
            ToolError::Permission { .. } => ErrorKind::Permission,
            ToolError::Conflict { .. } => ErrorKind::Conflict,
            ToolError::Transient { .. } => ErrorKind::Transient,
            ToolError::Timeout { .. } => ErrorKind::Timeout,
            ToolError::Cancelled { .. } => ErrorKind::Cancelled,
            ToolError::Sandbox { .. } => ErrorKind::Sandbox,
            ToolError::System { .. } => ErrorKind::System,
            ToolError::Protocol { .. } => ErrorKind::Protocol,
        }
    }

    /// Whether this failure aborts the turn.
    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ToolError::Cancelled { .. })
    }

    /// The message delivered to the model for respond-to-model failures.
    pub fn to_model_message(&self) -> String {
        self.to_string()
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => tool_error::NotFoundSnafu {
                message: err.to_string(),
            }
            .build(),
            _ => tool_error::SystemSnafu {
                message: err.to_string(),
            }
            .build(),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        tool_error::ValidationSnafu {
            message: format!("JSON error: {err}"),
        }
        .build()
    }
}

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
#[path = "error.test.rs"]
mod tests;
