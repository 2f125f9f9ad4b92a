//! Error classification shared across the crucible workspace.
//!
//! Every tool failure carries an [`ErrorKind`]; the registry branches on the
//! kind's [`Severity`] to decide whether the failure flows back to the model
//! as an error tool-result or aborts the turn.

mod kind;

pub use kind::ErrorKind;
pub use kind::Severity;

/// Re-exported so downstream error enums can capture source locations the
/// same way without naming snafu directly.
pub use snafu::Location;
