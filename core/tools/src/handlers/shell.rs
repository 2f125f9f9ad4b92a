//! Shell command execution.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use crucible_policy::ApprovalDecision;
use crucible_policy::ApprovalPolicy;
use crucible_policy::ApprovalRequest;
use crucible_protocol::ShellCallParams;
use crucible_protocol::ToolOutput;
use crucible_protocol::ToolPayload;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::context::BackgroundTask;
use crate::context::ToolInvocation;
use crate::error::Result;
use crate::error::tool_error;
use crate::handler::ToolHandler;
use crate::handler::ToolKind;
use crate::truncate::format_exec_output;

/// Default runtime budget when neither the call nor the policy caps it.
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Tool for executing shell commands, foreground or background.
pub struct ShellHandler;

#[derive(Debug, Deserialize)]
struct ShellArgs {
    command: CommandInput,
    #[serde(alias = "cwd")]
    workdir: Option<String>,
    timeout_ms: Option<u64>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    with_escalated_permissions: bool,
    justification: Option<String>,
    #[serde(default)]
    is_background: bool,
}

/// The model sends either an argv array or a single command line.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandInput {
    Argv(Vec<String>),
    Line(String),
}

impl ShellArgs {
    fn argv(&self) -> Result<Vec<String>> {
        let argv = match &self.command {
            CommandInput::Argv(argv) => argv.clone(),
            CommandInput::Line(line) => shlex::split(line).ok_or_else(|| {
                tool_error::ValidationSnafu {
                    message: format!("command line could not be tokenized: {line:?}"),
                }
                .build()
            })?,
        };
        if argv.is_empty() {
            return Err(tool_error::ValidationSnafu {
                message: "command must not be empty",
            }
            .build());
        }
        Ok(argv)
    }

    fn from_local_shell(params: &ShellCallParams) -> Self {
        Self {
            command: CommandInput::Argv(params.command.clone()),
            workdir: params.workdir.clone(),
            timeout_ms: params.timeout_ms,
            env: HashMap::new(),
            with_escalated_permissions: params.with_escalated_permissions.unwrap_or(false),
            justification: params.justification.clone(),
            is_background: false,
        }
    }
}

/// Commands whose only effect is reading state; hosts may treat plain
/// reads as parallel-safe when registering specs.
pub fn is_read_only_command(argv: &[String]) -> bool {
    let program = match argv.first() {
        Some(program) => program,
        None => return false,
    };
    let basename = std::path::Path::new(program)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| program.clone());

    match basename.as_str() {
        "git" => matches!(
            argv.get(1).map(String::as_str),
            Some(
                "status" | "log" | "diff" | "show" | "branch" | "remote" | "rev-parse"
                    | "ls-files" | "blame" | "describe"
            )
        ),
        _ => matches!(
            basename.as_str(),
            "ls" | "cat"
                | "head"
                | "tail"
                | "wc"
                | "grep"
                | "rg"
                | "find"
                | "which"
                | "whoami"
                | "pwd"
                | "echo"
                | "date"
                | "env"
                | "printenv"
                | "uname"
                | "hostname"
                | "df"
                | "du"
                | "file"
                | "stat"
        ),
    }
}

#[async_trait]
impl ToolHandler for ShellHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    fn matches_kind(&self, payload: &ToolPayload) -> bool {
        matches!(
            payload,
            ToolPayload::Function { .. }
                | ToolPayload::UnifiedExec { .. }
                | ToolPayload::LocalShell { .. }
        )
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let args = match &invocation.payload {
            ToolPayload::Function { raw_arguments }
            | ToolPayload::UnifiedExec { raw_arguments } => {
                serde_json::from_str::<ShellArgs>(raw_arguments)?
            }
            ToolPayload::LocalShell { params } => ShellArgs::from_local_shell(params),
            other => {
                return Err(tool_error::ValidationSnafu {
                    message: format!("shell cannot serve a {} payload", other.tag()),
                }
                .build());
            }
        };
        let argv = args.argv()?;
        let turn = &invocation.turn;

        // Escalation requests are rejected outright when approvals are
        // disabled; the model may retry without the flag.
        if args.with_escalated_permissions
            && turn.policy.approval == ApprovalPolicy::Never
        {
            return Err(tool_error::PermissionSnafu {
                message: "escalated permissions rejected: approvals are disabled; \
                          retry without with_escalated_permissions",
            }
            .build());
        }

        turn.policy.check_command(&argv).map_err(|violation| {
            tool_error::SandboxSnafu {
                message: violation.to_string(),
            }
            .build()
        })?;

        let writes = !is_read_only_command(&argv);
        if turn
            .policy
            .requires_approval(writes, args.with_escalated_permissions)
        {
            let request = ApprovalRequest {
                tool_name: "shell".to_string(),
                description: argv.join(" "),
                justification: args.justification.clone(),
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

        let cwd = args
            .workdir
            .as_deref()
            .map(|workdir| turn.resolve_path(workdir))
            .unwrap_or_else(|| turn.cwd.clone());
        let timeout_ms = turn
            .policy
            .cap_timeout_ms(args.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        if args.is_background {
            return spawn_background(&invocation, &argv, &cwd, &args.env).await;
        }
        run_foreground(&invocation, &argv, &cwd, &args.env, timeout_ms).await
    }
}

fn base_command(argv: &[String], cwd: &std::path::Path, env: &HashMap<String, String>) -> tokio::process::Command {
    let mut command = tokio::process::Command::new(&argv[0]);
    command.args(&argv[1..]);
    command.current_dir(cwd);
    command.envs(env);
    command.stdin(Stdio::null());
    command.kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    command
}

async fn run_foreground(
    invocation: &ToolInvocation,
    argv: &[String],
    cwd: &std::path::Path,
    env: &HashMap<String, String>,
    timeout_ms: u64,
) -> Result<ToolOutput> {
    let mut command = base_command(argv, cwd, env);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let started = Instant::now();
    let mut child = command.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_task = tokio::spawn(read_stream(stdout));
    let stderr_task = tokio::spawn(read_stream(stderr));

    let mut timed_out = false;
    let status = tokio::select! {
        biased;
        _ = invocation.turn.cancel.cancelled() => {
            kill_process_group(&mut child).await;
            return Err(tool_error::CancelledSnafu.build());
        }
        waited = tokio::time::timeout(Duration::from_millis(timeout_ms), child.wait()) => {
            match waited {
                Ok(status) => Some(status?),
                Err(_elapsed) => {
                    debug!(timeout_ms, "shell command timed out; killing process group");
                    timed_out = true;
                    kill_process_group(&mut child).await;
                    None
                }
            }
        }
    };

    let mut combined = stdout_task.await.unwrap_or_default();
    combined.push_str(&stderr_task.await.unwrap_or_default());
    let exit_code = status.and_then(|status| status.code()).unwrap_or(-1);

    let envelope = format_exec_output(&combined, exit_code, started.elapsed(), timed_out);
    let success = exit_code == 0 && !timed_out;
    let mut metadata = serde_json::to_value(envelope.metadata)
        .unwrap_or(serde_json::Value::Null);

    // The model gets the truncated form; the untruncated output is spooled
    // to disk so transcript writers can pick it up.
    if envelope.metadata.truncated {
        let spool_path = std::env::temp_dir()
            .join(format!("crucible-tool-result-{}.log", invocation.call_id));
        match std::fs::write(&spool_path, &combined) {
            Ok(()) => {
                if let Some(object) = metadata.as_object_mut() {
                    object.insert(
                        "full_output_path".to_string(),
                        serde_json::json!(spool_path),
                    );
                }
            }
            Err(err) => debug!(error = %err, "failed to spool untruncated output"),
        }
    }

    Ok(ToolOutput::Function {
        content: envelope.to_json().to_string(),
        success,
        metadata: Some(metadata),
    })
}

async fn spawn_background(
    invocation: &ToolInvocation,
    argv: &[String],
    cwd: &std::path::Path,
    env: &HashMap<String, String>,
) -> Result<ToolOutput> {
    let log_path = std::env::temp_dir().join(format!("crucible-shell-{}.log", invocation.call_id));
    let log_file = std::fs::File::create(&log_path)?;
    let log_clone = log_file.try_clone()?;

    let mut command = base_command(argv, cwd, env);
    command.stdout(Stdio::from(log_file));
    command.stderr(Stdio::from(log_clone));
    // The task outlives the call; killing it is the session's decision.
    command.kill_on_drop(false);

    let mut child = command.spawn()?;
    let pid = child.id();
    let task_id = format!("bg-{}", invocation.call_id);

    invocation.turn.background_tasks.lock().await.insert(
        task_id.clone(),
        BackgroundTask {
            id: task_id.clone(),
            command: argv.join(" "),
            log_path: log_path.clone(),
            pid,
        },
    );

    // Reap the child when it exits so it never zombies.
    tokio::spawn(async move {
        let _ = child.wait().await;
    });

    let descriptor = serde_json::json!({
        "background_task_id": task_id,
        "log_path": log_path,
        "pid": pid,
    });
    Ok(ToolOutput::text(descriptor.to_string()))
}

async fn read_stream(stream: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buffer).await;
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

async fn kill_process_group(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // The child was spawned as its own process group leader, so this
        // takes down any grandchildren too.
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }
    let _ = child.kill().await;
}

#[cfg(test)]
#[path = "shell.test.rs"]
mod tests;
