//! Execution policy: the gates handlers consult before side effects.
//!
//! Policy checks run inside the handler, before any scheduler or tracker
//! lock is taken. A sandbox violation is fatal; a denied approval flows
//! back to the model as an error tool-result.

mod approval;
mod policy;

pub use approval::ApprovalDecision;
pub use approval::ApprovalRequest;
pub use approval::ApprovalRequester;
pub use policy::ApprovalPolicy;
pub use policy::ExecutionPolicy;
pub use policy::PolicyViolation;
pub use policy::SandboxMode;
