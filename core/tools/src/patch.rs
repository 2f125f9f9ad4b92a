//! Parsing and applying the patch envelope format.
//!
//! The envelope grammar:
//!
//! ```text
//! *** Begin Patch
//! *** Add File: <path>
//! +<line>
//! *** Update File: <path>
//! *** Move to: <path>        (optional)
//! @@ <context>               (optional per chunk)
//!  <kept line>
//! -<removed line>
//! +<added line>
//! *** Delete File: <path>
//! *** End Patch
//! ```
//!
//! Parsing only validates shape; matching against file contents happens in
//! [`apply_chunks`] so pre-image disagreements surface as conflicts.

use std::path::PathBuf;

use crate::error::Result;
use crate::error::tool_error;

const BEGIN_MARKER: &str = "*** Begin Patch";
const END_MARKER: &str = "*** End Patch";
const ADD_MARKER: &str = "*** Add File: ";
const DELETE_MARKER: &str = "*** Delete File: ";
const UPDATE_MARKER: &str = "*** Update File: ";
const MOVE_MARKER: &str = "*** Move to: ";
const EOF_MARKER: &str = "*** End of File";

/// One file-level operation in a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    Add {
        path: PathBuf,
        content: String,
    },
    Delete {
        path: PathBuf,
    },
    Update {
        path: PathBuf,
        move_to: Option<PathBuf>,
        chunks: Vec<Chunk>,
    },
}

impl PatchOp {
    /// The path this operation targets.
    pub fn path(&self) -> &PathBuf {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Delete { path }
            | PatchOp::Update { path, .. } => path,
        }
    }
}

/// A contiguous replacement inside an update.
///
/// `old_lines` (kept + removed lines) must occur in the file, strictly
/// after `context` when one is given; they are replaced by `new_lines`
/// (kept + added lines).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub context: Option<String>,
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
    /// When set, `old_lines` must sit at the end of the file.
    pub at_end_of_file: bool,
}

impl Chunk {
    fn is_empty(&self) -> bool {
        self.context.is_none() && self.old_lines.is_empty() && self.new_lines.is_empty()
    }
}

/// Parse a patch envelope into its operations.
pub fn parse_patch(text: &str) -> Result<Vec<PatchOp>> {
    let mut lines = text.trim().lines().peekable();

    if lines.next().map(str::trim_end) != Some(BEGIN_MARKER) {
        return Err(tool_error::ValidationSnafu {
            message: format!("patch must start with {BEGIN_MARKER:?}"),
        }
        .build());
    }

    let mut ops = Vec::new();
    let mut saw_end = false;

    while let Some(line) = lines.next() {
        let line = line.trim_end_matches('\r');
        if line == END_MARKER {
            saw_end = true;
            break;
        } else if let Some(path) = line.strip_prefix(ADD_MARKER) {
            let mut content = String::new();
            while let Some(next) = lines.peek() {
                match next.strip_prefix('+') {
                    Some(added) => {
                        content.push_str(added);
                        content.push('\n');
                        lines.next();
                    }
                    None => break,
                }
            }
            ops.push(PatchOp::Add {
                path: PathBuf::from(path.trim()),
                content,
            });
        } else if let Some(path) = line.strip_prefix(DELETE_MARKER) {
            ops.push(PatchOp::Delete {
                path: PathBuf::from(path.trim()),
            });
        } else if let Some(path) = line.strip_prefix(UPDATE_MARKER) {
            let mut move_to = None;
            if let Some(next) = lines.peek() {
                if let Some(target) = next.strip_prefix(MOVE_MARKER) {
                    move_to = Some(PathBuf::from(target.trim()));
                    lines.next();
                }
            }

            let mut chunks = Vec::new();
            let mut chunk = Chunk::default();
            while let Some(next) = lines.peek() {
                let next = next.trim_end_matches('\r');
                if next != EOF_MARKER && (next.starts_with("*** ") || next == END_MARKER) {
                    break;
                }
                let next = lines.next().unwrap_or_default().trim_end_matches('\r');
                if next == EOF_MARKER {
                    chunk.at_end_of_file = true;
                    chunks.push(std::mem::take(&mut chunk));
                } else if next == "@@" || next.starts_with("@@ ") {
                    if !chunk.is_empty() {
                        chunks.push(std::mem::take(&mut chunk));
                    }
                    chunk.context = next.strip_prefix("@@ ").map(|context| context.to_string());
                } else if let Some(kept) = next.strip_prefix(' ') {
                    chunk.old_lines.push(kept.to_string());
                    chunk.new_lines.push(kept.to_string());
                } else if let Some(removed) = next.strip_prefix('-') {
                    chunk.old_lines.push(removed.to_string());
                } else if let Some(added) = next.strip_prefix('+') {
                    chunk.new_lines.push(added.to_string());
                } else if next.is_empty() {
                    // Blank kept line without the leading space.
                    chunk.old_lines.push(String::new());
                    chunk.new_lines.push(String::new());
                } else {
                    return Err(tool_error::ValidationSnafu {
                        message: format!("unexpected line in update hunk: {next:?}"),
                    }
                    .build());
                }
            }
            if !chunk.is_empty() {
                chunks.push(chunk);
            }
            if chunks.is_empty() {
                return Err(tool_error::ValidationSnafu {
                    message: format!("update for {path:?} contains no changes"),
                }
                .build());
            }
            ops.push(PatchOp::Update {
                path: PathBuf::from(path.trim()),
                move_to,
                chunks,
            });
        } else if line.trim().is_empty() {
            // Tolerate stray blank lines between hunks.
        } else {
            return Err(tool_error::ValidationSnafu {
                message: format!("unexpected line in patch: {line:?}"),
            }
            .build());
        }
    }

    if !saw_end {
        return Err(tool_error::ValidationSnafu {
            message: format!("patch must end with {END_MARKER:?}"),
        }
        .build());
    }
    if ops.is_empty() {
        return Err(tool_error::ValidationSnafu {
            message: "patch contains no operations",
        }
        .build());
    }
    Ok(ops)
}

/// Apply an update's chunks to the current file content.
///
/// Fails with a conflict when a chunk's pre-image cannot be located, which
/// is how external modifications between read and patch surface.
pub fn apply_chunks(path: &std::path::Path, content: &str, chunks: &[Chunk]) -> Result<String> {
    let had_trailing_newline = content.is_empty() || content.ends_with('\n');
    let mut lines: Vec<String> = content.lines().map(String::from).collect();
    let mut cursor = 0usize;

    for chunk in chunks {
        let search_start = match &chunk.context {
            Some(context) => {
                let position = lines[cursor..]
                    .iter()
                    .position(|line| line.trim() == context.trim())
                    .map(|offset| cursor + offset);
                match position {
                    Some(index) => index + 1,
                    None => {
                        return Err(conflict(path, format!("context {context:?} not found")));
                    }
                }
            }
            None => cursor,
        };

        if chunk.old_lines.is_empty() {
            // Pure insertion after the context line (or at the cursor).
            let insert_at = search_start.min(lines.len());
            lines.splice(insert_at..insert_at, chunk.new_lines.iter().cloned());
            cursor = insert_at + chunk.new_lines.len();
            continue;
        }

        let found = find_block(&lines, &chunk.old_lines, search_start);
        let index = match found {
            Some(index) => index,
            None => {
                return Err(conflict(
                    path,
                    format!(
                        "pre-image not found; the file differs from what the patch expects near {:?}",
                        chunk.old_lines.first().map(String::as_str).unwrap_or("")
                    ),
                ));
            }
        };
        if chunk.at_end_of_file && index + chunk.old_lines.len() != lines.len() {
            return Err(conflict(path, "pre-image is not at end of file".to_string()));
        }

        lines.splice(
            index..index + chunk.old_lines.len(),
            chunk.new_lines.iter().cloned(),
        );
        cursor = index + chunk.new_lines.len();
    }

    let mut updated = lines.join("\n");
    if had_trailing_newline && !updated.is_empty() {
        updated.push('\n');
    }
    Ok(updated)
}

fn find_block(lines: &[String], block: &[String], start: usize) -> Option<usize> {
    if block.is_empty() || start > lines.len() {
        return None;
    }
    let last_start = lines.len().checked_sub(block.len())?;
    (start..=last_start).find(|&index| {
        lines[index..index + block.len()]
            .iter()
            .zip(block)
            .all(|(have, want)| have == want)
    })
}

fn conflict(path: &std::path::Path, message: String) -> crate::error::ToolError {
    tool_error::ConflictSnafu {
        message: format!("{}: {message}", path.display()),
    }
    .build()
}

#[cfg(test)]
#[path = "patch.test.rs"]
mod tests;
