//! File reading.

use async_trait::async_trait;
use crucible_protocol::ToolOutput;
use crucible_protocol::ToolPayload;
use crucible_tracker::sha256_hex;
use serde::Deserialize;

use crate::context::ToolInvocation;
use crate::error::Result;
use crate::error::tool_error;
use crate::handler::ToolHandler;
use crate::handler::ToolKind;
use crate::truncate::truncate_output;

/// Tool for reading files with an optional line window.
///
/// Reads record the hash of the full on-disk content so later edits can
/// detect external modification.
pub struct ReadFileHandler;

#[derive(Debug, Deserialize)]
struct ReadArgs {
    #[serde(alias = "path")]
    file_path: String,
    /// 1-indexed first line of the window.
    offset: Option<usize>,
    /// Maximum number of lines to return.
    limit: Option<usize>,
}

#[async_trait]
impl ToolHandler for ReadFileHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let raw_arguments = match &invocation.payload {
            ToolPayload::Function { raw_arguments } => raw_arguments,
            other => {
                return Err(tool_error::ValidationSnafu {
                    message: format!("read_file cannot serve a {} payload", other.tag()),
                }
                .build());
            }
        };
        let args: ReadArgs = serde_json::from_str(raw_arguments)?;
        if args.file_path.trim().is_empty() {
            return Err(tool_error::ValidationSnafu {
                message: "file_path must not be empty",
            }
            .build());
        }

        let path = invocation.turn.resolve_path(&args.file_path);
        let bytes = tokio::fs::read(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                tool_error::NotFoundSnafu {
                    message: format!("file not found: {}", path.display()),
                }
                .build()
            } else {
                err.into()
            }
        })?;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        invocation
            .tracker
            .record_read(&path, &invocation.tool_name, Some(sha256_hex(&content)));

        let windowed = match (args.offset, args.limit) {
            (None, None) => content,
            (offset, limit) => {
                let skip = offset.unwrap_or(1).saturating_sub(1);
                let take = limit.unwrap_or(usize::MAX);
                content
                    .split_inclusive('\n')
                    .skip(skip)
                    .take(take)
                    .collect()
            }
        };

        let formatted = truncate_output(&windowed);
        Ok(ToolOutput::Function {
            content: formatted.text,
            success: true,
            metadata: Some(serde_json::json!({ "truncated": formatted.truncated })),
        })
    }
}

#[cfg(test)]
#[path = "read_file.test.rs"]
mod tests;
