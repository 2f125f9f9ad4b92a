//! File edit records.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

/// What a handler did to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Read,
    Create,
    Update,
    Delete,
    Rename,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Read => "read",
            FileAction::Create => "create",
            FileAction::Update => "update",
            FileAction::Delete => "delete",
            FileAction::Rename => "rename",
        }
    }

    /// Reads leave the filesystem untouched.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, FileAction::Read)
    }
}

impl std::fmt::Display for FileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded operation. Created under the tracker's lock and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: PathBuf,
    pub tool_name: String,
    pub timestamp: DateTime<Utc>,
    pub action: FileAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_range: Option<(u32, u32)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<String>,
    /// Destination path for [`FileAction::Rename`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<PathBuf>,
}

impl FileEdit {
    /// Build a record, deriving hashes from the contents.
    pub fn new(
        path: impl Into<PathBuf>,
        tool_name: impl Into<String>,
        action: FileAction,
        old_content: Option<String>,
        new_content: Option<String>,
    ) -> Self {
        let old_hash = old_content.as_deref().map(sha256_hex);
        let new_hash = new_content.as_deref().map(sha256_hex);
        Self {
            path: path.into(),
            tool_name: tool_name.into(),
            timestamp: Utc::now(),
            action,
            old_content,
            new_content,
            line_range: None,
            old_hash,
            new_hash,
            renamed_to: None,
        }
    }
}

/// Lowercase hex SHA-256 of a file's content, used for pre-image checks.
pub fn sha256_hex(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut acc, byte| {
        let _ = write!(acc, "{byte:02x}");
        acc
    })
}

#[cfg(test)]
#[path = "edit.test.rs"]
mod tests;
