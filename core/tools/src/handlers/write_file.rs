//! Whole-file writes.

use std::path::Path;

use async_trait::async_trait;
use crucible_policy::ApprovalDecision;
use crucible_policy::ApprovalRequest;
use crucible_protocol::ToolOutput;
use crucible_protocol::ToolPayload;
use crucible_tracker::FileAction;
use crucible_tracker::sha256_hex;
use serde::Deserialize;

use crate::context::ToolInvocation;
use crate::error::Result;
use crate::error::tool_error;
use crate::handler::ToolHandler;
use crate::handler::ToolKind;

/// Tool that creates or overwrites one file.
///
/// The target path is locked in the tracker for the duration of the write;
/// an overwrite whose on-disk content no longer matches the recorded read
/// hash fails with a conflict instead of clobbering external changes.
pub struct WriteFileHandler;

#[derive(Debug, Deserialize)]
struct WriteArgs {
    #[serde(alias = "path")]
    file_path: String,
    content: String,
}

#[async_trait]
impl ToolHandler for WriteFileHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let raw_arguments = match &invocation.payload {
            ToolPayload::Function { raw_arguments } => raw_arguments,
            other => {
                return Err(tool_error::ValidationSnafu {
                    message: format!("write_file cannot serve a {} payload", other.tag()),
                }
                .build());
            }
        };
        let args: WriteArgs = serde_json::from_str(raw_arguments)?;
        let turn = &invocation.turn;
        let path = turn.resolve_path(&args.file_path);

        turn.policy
            .check_write_path(&turn.cwd, &path)
            .map_err(|violation| {
                tool_error::SandboxSnafu {
                    message: violation.to_string(),
                }
                .build()
            })?;

        if turn.policy.requires_approval(true, false) {
            let request = ApprovalRequest {
                tool_name: "write_file".to_string(),
                description: format!("write {}", path.display()),
                justification: None,
            };
            match &turn.approval {
                Some(requester) => {
                    if requester.request_approval(request).await == ApprovalDecision::Denied {
                        return Err(tool_error::PermissionSnafu {
                            message: "denied by user",
                        }
                        .build());
                    }
                }
                None => {
                    return Err(tool_error::PermissionSnafu {
                        message: "approval required but no approver is available",
                    }
                    .build());
                }
            }
        }

        // Approval is settled; only now take the writer-intent lock.
        let _guard = invocation
            .tracker
            .lock_file_guard(&path)
            .map_err(|err| {
                tool_error::ConflictSnafu {
                    message: err.to_string(),
                }
                .build()
            })?;

        let old_content = match tokio::fs::read(&path).await {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        // Overwrites must start from the content the model last saw.
        if let Some(ref on_disk) = old_content {
            if let Some(read_hash) = last_read_hash(&invocation, &path) {
                if read_hash != sha256_hex(on_disk) {
                    let descriptor = format!(
                        "conflict on {}: file changed on disk since it was last read",
                        path.display()
                    );
                    invocation.tracker.record_conflict(descriptor.clone());
                    return Err(tool_error::ConflictSnafu {
                        message: descriptor,
                    }
                    .build());
                }
            }
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&path, &args.content).await?;

        let action = if old_content.is_some() {
            FileAction::Update
        } else {
            FileAction::Create
        };
        invocation.tracker.record_edit(
            &path,
            &invocation.tool_name,
            action,
            old_content,
            Some(args.content),
        );

        Ok(ToolOutput::text(format!(
            "{} {}",
            match action {
                FileAction::Create => "created",
                _ => "updated",
            },
            path.display()
        )))
    }
}

/// Hash recorded by the most recent read of `path` this turn, if any.
fn last_read_hash(invocation: &ToolInvocation, path: &Path) -> Option<String> {
    invocation
        .tracker
        .edits_for(path)
        .into_iter()
        .rev()
        .find(|edit| edit.action == FileAction::Read)
        .and_then(|edit| edit.old_hash)
}

#[cfg(test)]
#[path = "write_file.test.rs"]
mod tests;
