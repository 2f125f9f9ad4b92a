//! The tool-error taxonomy and its severity mapping.

use strum::AsRefStr;
use strum::EnumIter;

/// What happens to the turn when an error of a given kind surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The error becomes a tool-result with `is_error = true`; the turn
    /// continues.
    RespondToModel,
    /// The error aborts the turn, triggers cleanup, and propagates to the
    /// host as a failure event.
    Fatal,
}

/// Classification of a tool failure.
///
/// The first six kinds are conversational: the model caused them or can
/// recover from them, so they are reported back as error tool-results. The
/// last three indicate the core itself is in trouble and abort the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or unparseable tool arguments.
    Validation,
    /// A referenced resource (file, tool, server) does not exist.
    NotFound,
    /// The user or policy denied the operation.
    Permission,
    /// A pre-image or lock disagreement between concurrent edits.
    Conflict,
    /// A transient failure; the owning handler may retry once.
    Transient,
    /// The operation exceeded its time budget.
    Timeout,
    /// The operation was cancelled by an interrupt.
    Cancelled,
    /// A sandbox rule was violated.
    Sandbox,
    /// The host system failed underneath the core.
    System,
    /// The model or transport broke the wire contract.
    Protocol,
}

impl ErrorKind {
    /// Map this kind to the action the registry takes.
    pub const fn severity(&self) -> Severity {
        match self {
            ErrorKind::Validation
            | ErrorKind::NotFound
            | ErrorKind::Permission
            | ErrorKind::Conflict
            | ErrorKind::Transient
            | ErrorKind::Timeout
            | ErrorKind::Cancelled => Severity::RespondToModel,
            ErrorKind::Sandbox | ErrorKind::System | ErrorKind::Protocol => Severity::Fatal,
        }
    }

    /// True when the failure aborts the turn.
    pub const fn is_fatal(&self) -> bool {
        matches!(self.severity(), Severity::Fatal)
    }

    /// True when one handler-level retry is permitted.
    pub const fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    /// Stable lowercase name used in telemetry records.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Permission => "permission",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transient => "transient",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Sandbox => "sandbox",
            ErrorKind::System => "system",
            ErrorKind::Protocol => "protocol",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[path = "kind.test.rs"]
mod tests;
