//! Sandbox, approval, path, and timeout gates.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use snafu::Snafu;

/// Command basenames allowed under [`SandboxMode::Strict`] when the host
/// supplies no safe-list of its own.
const DEFAULT_SAFE_COMMANDS: &[&str] = &[
    "cat", "date", "df", "du", "echo", "env", "file", "find", "grep", "head", "hostname", "ls",
    "printenv", "pwd", "rg", "stat", "tail", "uname", "wc", "which", "whoami",
];

/// How much of the machine a command may touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxMode {
    /// Unrestricted.
    #[default]
    None,
    /// Deny commands containing a blocked substring.
    Restricted,
    /// Allow only an explicit safe-list of command basenames.
    Strict,
}

/// When the user must be asked before a tool runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPolicy {
    /// Never ask; escalation requests are rejected outright.
    Never,
    /// Ask only when the call itself requests escalated permissions.
    #[default]
    OnRequest,
    /// Ask for any operation that writes to the filesystem.
    OnWrite,
    /// Ask before every side-effecting call.
    Always,
}

/// A rejected operation.
#[derive(Debug, Snafu)]
pub enum PolicyViolation {
    #[snafu(display("command is empty"))]
    EmptyCommand,

    #[snafu(display("command contains blocked substring {needle:?}"))]
    BlockedCommand { needle: String },

    #[snafu(display("command {program:?} is not on the sandbox safe-list"))]
    CommandNotSafelisted { program: String },

    #[snafu(display("write target {} is outside the allowed paths", path.display()))]
    PathOutsideSandbox { path: PathBuf },
}

/// The gates consulted by handlers before side-effecting operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    #[serde(default)]
    pub sandbox: SandboxMode,
    #[serde(default)]
    pub approval: ApprovalPolicy,
    /// When non-empty, every filesystem write target must resolve inside at
    /// least one of these paths.
    #[serde(default)]
    pub allowed_paths: Vec<PathBuf>,
    /// Literal substrings denied under [`SandboxMode::Restricted`].
    #[serde(default)]
    pub blocked_commands: Vec<String>,
    /// Basenames allowed under [`SandboxMode::Strict`]; empty means the
    /// built-in read-only set.
    #[serde(default)]
    pub safe_commands: Vec<String>,
    /// Upper cap coerced onto any handler-supplied timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
}

impl ExecutionPolicy {
    /// Gate a command line against the sandbox mode.
    pub fn check_command(&self, command: &[String]) -> Result<(), PolicyViolation> {
        let program = command.first().ok_or(PolicyViolation::EmptyCommand)?;

        match self.sandbox {
            SandboxMode::None => Ok(()),
            SandboxMode::Restricted => {
                let line = command.join(" ");
                for needle in &self.blocked_commands {
                    if !needle.is_empty() && line.contains(needle) {
                        return Err(PolicyViolation::BlockedCommand {
                            needle: needle.clone(),
                        });
                    }
                }
                Ok(())
            }
            SandboxMode::Strict => {
                let basename = Path::new(program)
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| program.clone());
                let allowed = if self.safe_commands.is_empty() {
                    DEFAULT_SAFE_COMMANDS.contains(&basename.as_str())
                } else {
                    self.safe_commands.iter().any(|safe| *safe == basename)
                };
                if allowed {
                    Ok(())
                } else {
                    Err(PolicyViolation::CommandNotSafelisted { program: basename })
                }
            }
        }
    }

    /// Gate a filesystem write target against `allowed_paths`.
    ///
    /// Resolution is lexical: relative targets are joined onto `cwd` and
    /// `.`/`..` components folded without touching the filesystem, so the
    /// check also covers paths that do not exist yet.
    pub fn check_write_path(&self, cwd: &Path, target: &Path) -> Result<(), PolicyViolation> {
        if self.allowed_paths.is_empty() {
            return Ok(());
        }
        let resolved = normalize(cwd, target);
        let permitted = self
            .allowed_paths
            .iter()
            .any(|root| resolved.starts_with(normalize(cwd, root)));
        if permitted {
            Ok(())
        } else {
            Err(PolicyViolation::PathOutsideSandbox { path: resolved })
        }
    }

    /// Whether this call needs a user approval round-trip.
    ///
    /// `writes` marks operations whose capability set includes filesystem
    /// writes; `escalation_requested` marks calls carrying
    /// `with_escalated_permissions`.
    pub fn requires_approval(&self, writes: bool, escalation_requested: bool) -> bool {
        match self.approval {
            ApprovalPolicy::Never => false,
            ApprovalPolicy::OnRequest => escalation_requested,
            ApprovalPolicy::OnWrite => writes || escalation_requested,
            ApprovalPolicy::Always => true,
        }
    }

    /// Coerce a handler-supplied timeout under the policy cap.
    pub fn cap_timeout_ms(&self, requested_ms: Option<u64>) -> Option<u64> {
        let cap_ms = self
            .timeout_seconds
            .filter(|secs| *secs > 0.0)
            .map(|secs| (secs * 1_000.0) as u64);
        match (requested_ms, cap_ms) {
            (Some(requested), Some(cap)) => Some(requested.min(cap)),
            (Some(requested), None) => Some(requested),
            (None, cap) => cap,
        }
    }
}

/// Join `path` onto `base` when relative and fold `.`/`..` components.
fn normalize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}

#[cfg(test)]
#[path = "policy.test.rs"]
mod tests;
