//! Patch application across multiple files.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use crucible_policy::ApprovalDecision;
use crucible_policy::ApprovalRequest;
use crucible_protocol::ToolOutput;
use crucible_protocol::ToolPayload;
use crucible_tracker::FileAction;
use crucible_tracker::FileLockGuard;
use crucible_tracker::sha256_hex;
use serde::Deserialize;

use crate::context::ToolInvocation;
use crate::error::Result;
use crate::error::ToolError;
use crate::error::tool_error;
use crate::handler::ToolHandler;
use crate::handler::ToolKind;
use crate::patch::Chunk;
use crate::patch::PatchOp;
use crate::patch::apply_chunks;
use crate::patch::parse_patch;

/// Tool that applies a patch envelope: adds, updates, deletes, and moves.
///
/// All target paths are locked before anything is verified, every pre-image
/// is checked before anything is written, and nothing touches the disk when
/// verification fails. Pre-image disagreement (an external write between
/// read and patch) is a conflict, recorded in the tracker, with every file
/// left unchanged.
pub struct ApplyPatchHandler;

#[derive(Debug, Deserialize)]
struct ApplyPatchArgs {
    input: String,
}

/// One fully-verified change, ready to commit.
enum PlannedChange {
    Add {
        path: PathBuf,
        content: String,
    },
    Update {
        path: PathBuf,
        move_to: Option<PathBuf>,
        old_content: String,
        new_content: String,
    },
    Delete {
        path: PathBuf,
        old_content: String,
    },
}

#[async_trait]
impl ToolHandler for ApplyPatchHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    fn matches_kind(&self, payload: &ToolPayload) -> bool {
        matches!(
            payload,
            ToolPayload::Function { .. } | ToolPayload::Custom { .. }
        )
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let patch_text = match &invocation.payload {
            ToolPayload::Function { raw_arguments } => {
                let args: ApplyPatchArgs = serde_json::from_str(raw_arguments)?;
                args.input
            }
            ToolPayload::Custom { raw_input, .. } => raw_input.clone(),
            other => {
                return Err(tool_error::ValidationSnafu {
                    message: format!("apply_patch cannot serve a {} payload", other.tag()),
                }
                .build());
            }
        };

        let ops = parse_patch(&patch_text)?;
        let turn = &invocation.turn;

        // Resolve and policy-check every write target up front.
        let mut targets = Vec::new();
        for op in &ops {
            let path = turn.resolve_path(&op.path().to_string_lossy());
            turn.policy
                .check_write_path(&turn.cwd, &path)
                .map_err(|violation| {
                    tool_error::SandboxSnafu {
                        message: violation.to_string(),
                    }
                    .build()
                })?;
            if let PatchOp::Update {
                move_to: Some(move_to),
                ..
            } = op
            {
                let destination = turn.resolve_path(&move_to.to_string_lossy());
                turn.policy
                    .check_write_path(&turn.cwd, &destination)
                    .map_err(|violation| {
                        tool_error::SandboxSnafu {
                            message: violation.to_string(),
                        }
                        .build()
                    })?;
            }
            targets.push(path);
        }

        if turn.policy.requires_approval(true, false) {
            let request = ApprovalRequest {
                tool_name: "apply_patch".to_string(),
                description: format!("apply patch to {} file(s)", ops.len()),
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

        // Lock everything before verifying anything; guards release on all
        // exit paths including cancellation.
        let mut guards: Vec<FileLockGuard> = Vec::with_capacity(targets.len());
        for path in &targets {
            let guard = invocation.tracker.lock_file_guard(path).map_err(|err| {
                tool_error::ConflictSnafu {
                    message: err.to_string(),
                }
                .build()
            })?;
            guards.push(guard);
        }

        // Verify pre-images and compute post-images without writing.
        let mut planned = Vec::with_capacity(ops.len());
        for (op, path) in ops.iter().zip(&targets) {
            let change = match op {
                PatchOp::Add { content, .. } => plan_add(path, content)?,
                PatchOp::Update {
                    move_to, chunks, ..
                } => {
                    let destination = move_to
                        .as_ref()
                        .map(|to| turn.resolve_path(&to.to_string_lossy()));
                    plan_update(&invocation, path, destination, chunks).await?
                }
                PatchOp::Delete { .. } => plan_delete(&invocation, path).await?,
            };
            planned.push(change);
        }

        // Commit.
        let mut summary = Vec::with_capacity(planned.len());
        for change in planned {
            match change {
                PlannedChange::Add { path, content } => {
                    if let Some(parent) = path.parent() {
                        if !parent.as_os_str().is_empty() && !parent.exists() {
                            tokio::fs::create_dir_all(parent).await?;
                        }
                    }
                    tokio::fs::write(&path, &content).await?;
                    invocation.tracker.record_edit(
                        &path,
                        &invocation.tool_name,
                        FileAction::Create,
                        None,
                        Some(content),
                    );
                    summary.push(format!("A {}", path.display()));
                }
                PlannedChange::Update {
                    path,
                    move_to,
                    old_content,
                    new_content,
                } => match move_to {
                    Some(destination) => {
                        if let Some(parent) = destination.parent() {
                            if !parent.as_os_str().is_empty() && !parent.exists() {
                                tokio::fs::create_dir_all(parent).await?;
                            }
                        }
                        tokio::fs::write(&destination, &new_content).await?;
                        tokio::fs::remove_file(&path).await?;
                        invocation
                            .tracker
                            .record_rename(&path, &destination, &invocation.tool_name);
                        invocation.tracker.record_edit(
                            &destination,
                            &invocation.tool_name,
                            FileAction::Update,
                            Some(old_content),
                            Some(new_content),
                        );
                        summary.push(format!("M {} -> {}", path.display(), destination.display()));
                    }
                    None => {
                        tokio::fs::write(&path, &new_content).await?;
                        invocation.tracker.record_edit(
                            &path,
                            &invocation.tool_name,
                            FileAction::Update,
                            Some(old_content),
                            Some(new_content),
                        );
                        summary.push(format!("M {}", path.display()));
                    }
                },
                PlannedChange::Delete { path, old_content } => {
                    tokio::fs::remove_file(&path).await?;
                    invocation.tracker.record_edit(
                        &path,
                        &invocation.tool_name,
                        FileAction::Delete,
                        Some(old_content),
                        None,
                    );
                    summary.push(format!("D {}", path.display()));
                }
            }
        }

        Ok(ToolOutput::text(format!(
            "Success. Updated the following files:\n{}",
            summary.join("\n")
        )))
    }
}

fn plan_add(path: &Path, content: &str) -> Result<PlannedChange> {
    if path.exists() {
        return Err(tool_error::ConflictSnafu {
            message: format!("cannot add {}: file already exists", path.display()),
        }
        .build());
    }
    Ok(PlannedChange::Add {
        path: path.to_path_buf(),
        content: content.to_string(),
    })
}

async fn plan_update(
    invocation: &ToolInvocation,
    path: &Path,
    move_to: Option<PathBuf>,
    chunks: &[Chunk],
) -> Result<PlannedChange> {
    let old_content = read_existing(path).await?;
    verify_read_hash(invocation, path, &old_content)?;
    let new_content = apply_chunks(path, &old_content, chunks).inspect_err(|err| {
        record_if_conflict(invocation, err);
    })?;
    Ok(PlannedChange::Update {
        path: path.to_path_buf(),
        move_to,
        old_content,
        new_content,
    })
}

async fn plan_delete(invocation: &ToolInvocation, path: &Path) -> Result<PlannedChange> {
    let old_content = read_existing(path).await?;
    verify_read_hash(invocation, path, &old_content)?;
    Ok(PlannedChange::Delete {
        path: path.to_path_buf(),
        old_content,
    })
}

async fn read_existing(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            tool_error::NotFoundSnafu {
                message: format!("file not found: {}", path.display()),
            }
            .build()
        } else {
            ToolError::from(err)
        }
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Compare the on-disk content against the hash recorded by this turn's
/// most recent read of `path`; disagreement means something else wrote the
/// file in between.
fn verify_read_hash(invocation: &ToolInvocation, path: &Path, on_disk: &str) -> Result<()> {
    let recorded = invocation
        .tracker
        .edits_for(path)
        .into_iter()
        .rev()
        .find(|edit| edit.action == FileAction::Read)
        .and_then(|edit| edit.old_hash);
    if let Some(recorded) = recorded {
        if recorded != sha256_hex(on_disk) {
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
    Ok(())
}

fn record_if_conflict(invocation: &ToolInvocation, err: &ToolError) {
    if matches!(err, ToolError::Conflict { .. }) {
        invocation.tracker.record_conflict(err.to_string());
    }
}

#[cfg(test)]
#[path = "apply_patch.test.rs"]
mod tests;
