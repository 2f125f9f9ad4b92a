//! The user-approval surface handlers call through.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

/// What the user is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub tool_name: String,
    /// One-line description of the operation (command line, file path, ...).
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

/// The user's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Denied,
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approved)
    }
}

/// Host-provided approval callback.
///
/// Handlers await the decision before acquiring any scheduler or tracker
/// lock, so a slow human answer never stalls other tool calls.
#[async_trait]
pub trait ApprovalRequester: Send + Sync {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalDecision;
}
