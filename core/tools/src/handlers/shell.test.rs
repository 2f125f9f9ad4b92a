use super::*;
use crate::context::TurnContextBuilder;
use crate::handler::ToolHandler;
use crucible_error::ErrorKind;
use crucible_policy::ApprovalRequester;
use crucible_policy::ExecutionPolicy;
use crucible_policy::SandboxMode;
use crucible_tracker::TurnDiffTracker;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

fn invocation_with_policy(arguments: serde_json::Value, policy: ExecutionPolicy) -> ToolInvocation {
    let turn = TurnContextBuilder::new("turn-1", std::env::temp_dir())
        .policy(policy)
        .build();
    ToolInvocation {
        turn: Arc::new(turn),
        tracker: Arc::new(TurnDiffTracker::new("turn-1")),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: "shell".to_string(),
        payload: ToolPayload::Function {
            raw_arguments: arguments.to_string(),
        },
    }
}

fn invocation(arguments: serde_json::Value) -> ToolInvocation {
    let policy = ExecutionPolicy {
        approval: ApprovalPolicy::Never,
        ..Default::default()
    };
    invocation_with_policy(arguments, policy)
}

fn envelope_of(output: &ToolOutput) -> serde_json::Value {
    match output {
        ToolOutput::Function { content, .. } => serde_json::from_str(content).unwrap(),
        other => panic!("expected function output, got {other:?}"),
    }
}

#[tokio::test]
async fn echo_succeeds_with_envelope() {
    let output = ShellHandler
        .handle(invocation(serde_json::json!({
            "command": ["/bin/echo", "tool harness"],
        })))
        .await
        .unwrap();

    assert!(output.success());
    let envelope = envelope_of(&output);
    assert_eq!(envelope["metadata"]["exit_code"], 0);
    assert_eq!(envelope["metadata"]["timed_out"], false);
    assert_eq!(envelope["metadata"]["truncated"], false);
    let body = envelope["output"].as_str().unwrap();
    assert!(body == "tool harness\n" || body == "tool harness");
}

#[tokio::test]
async fn string_commands_are_tokenized() {
    let output = ShellHandler
        .handle(invocation(serde_json::json!({
            "command": "/bin/echo one two",
        })))
        .await
        .unwrap();
    let envelope = envelope_of(&output);
    assert!(envelope["output"].as_str().unwrap().contains("one two"));
}

#[tokio::test]
async fn nonzero_exit_is_reported_as_error() {
    let output = ShellHandler
        .handle(invocation(serde_json::json!({
            "command": ["/bin/sh", "-c", "exit 3"],
        })))
        .await
        .unwrap();
    assert!(!output.success());
    let envelope = envelope_of(&output);
    assert_eq!(envelope["metadata"]["exit_code"], 3);
}

#[tokio::test]
async fn timeout_kills_and_marks_timed_out() {
    let output = ShellHandler
        .handle(invocation(serde_json::json!({
            "command": ["/bin/sleep", "5"],
            "timeout_ms": 200,
        })))
        .await
        .unwrap();
    assert!(!output.success());
    let envelope = envelope_of(&output);
    assert_eq!(envelope["metadata"]["timed_out"], true);
}

#[tokio::test]
async fn stderr_is_captured() {
    let output = ShellHandler
        .handle(invocation(serde_json::json!({
            "command": ["/bin/sh", "-c", "echo oops >&2"],
        })))
        .await
        .unwrap();
    let envelope = envelope_of(&output);
    assert!(envelope["output"].as_str().unwrap().contains("oops"));
}

#[tokio::test]
async fn escalation_is_rejected_when_approvals_are_disabled() {
    let err = ShellHandler
        .handle(invocation(serde_json::json!({
            "command": ["/bin/echo", "hi"],
            "with_escalated_permissions": true,
        })))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permission);
    assert!(err.to_string().contains("reject"));
}

#[tokio::test]
async fn retry_without_escalation_succeeds() {
    // Same command, flag removed: the second turn of the scenario.
    let output = ShellHandler
        .handle(invocation(serde_json::json!({
            "command": ["/bin/echo", "hi"],
        })))
        .await
        .unwrap();
    assert!(output.success());
}

#[tokio::test]
async fn blocked_substrings_are_sandbox_violations() {
    let policy = ExecutionPolicy {
        sandbox: SandboxMode::Restricted,
        approval: ApprovalPolicy::Never,
        blocked_commands: vec!["rm -rf".to_string()],
        ..Default::default()
    };
    let err = ShellHandler
        .handle(invocation_with_policy(
            serde_json::json!({"command": ["rm", "-rf", "/tmp/x"]}),
            policy,
        ))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Sandbox);
    assert!(err.is_fatal());
}

struct ScriptedApprover {
    decision: ApprovalDecision,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ApprovalRequester for ScriptedApprover {
    async fn request_approval(&self, _request: ApprovalRequest) -> ApprovalDecision {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.decision
    }
}

#[tokio::test]
async fn denied_approval_is_a_permission_error() {
    let approver = Arc::new(ScriptedApprover {
        decision: ApprovalDecision::Denied,
        calls: AtomicUsize::new(0),
    });
    let policy = ExecutionPolicy {
        approval: ApprovalPolicy::OnWrite,
        ..Default::default()
    };
    let turn = TurnContextBuilder::new("turn-1", std::env::temp_dir())
        .policy(policy)
        .approval(Arc::clone(&approver) as Arc<dyn ApprovalRequester>)
        .build();
    let invocation = ToolInvocation {
        turn: Arc::new(turn),
        tracker: Arc::new(TurnDiffTracker::new("turn-1")),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: "shell".to_string(),
        payload: ToolPayload::Function {
            raw_arguments: serde_json::json!({"command": ["/usr/bin/touch", "x"]}).to_string(),
        },
    };

    let err = ShellHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permission);
    assert!(err.to_string().contains("denied by user"));
    assert_eq!(approver.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn read_only_commands_skip_on_write_approval() {
    let approver = Arc::new(ScriptedApprover {
        decision: ApprovalDecision::Denied,
        calls: AtomicUsize::new(0),
    });
    let policy = ExecutionPolicy {
        approval: ApprovalPolicy::OnWrite,
        ..Default::default()
    };
    let turn = TurnContextBuilder::new("turn-1", std::env::temp_dir())
        .policy(policy)
        .approval(Arc::clone(&approver) as Arc<dyn ApprovalRequester>)
        .build();
    let invocation = ToolInvocation {
        turn: Arc::new(turn),
        tracker: Arc::new(TurnDiffTracker::new("turn-1")),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: "shell".to_string(),
        payload: ToolPayload::Function {
            raw_arguments: serde_json::json!({"command": ["/bin/echo", "safe"]}).to_string(),
        },
    };

    let output = ShellHandler.handle(invocation).await.unwrap();
    assert!(output.success());
    assert_eq!(approver.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn background_mode_returns_a_descriptor() {
    let invocation = invocation(serde_json::json!({
        "command": ["/bin/sh", "-c", "echo bg"],
        "is_background": true,
    }));
    let tasks = Arc::clone(&invocation.turn.background_tasks);

    let output = ShellHandler.handle(invocation).await.unwrap();
    assert!(output.success());
    let descriptor: serde_json::Value =
        serde_json::from_str(&output.content_text()).unwrap();
    let task_id = descriptor["background_task_id"].as_str().unwrap();
    assert!(task_id.starts_with("bg-"));

    let registered = tasks.lock().await;
    assert!(registered.contains_key(task_id));
}

#[tokio::test]
async fn truncated_output_is_spooled_in_full() {
    let output = ShellHandler
        .handle(invocation(serde_json::json!({
            "command": ["/bin/sh", "-c", "seq 1 5000"],
        })))
        .await
        .unwrap();
    let envelope = envelope_of(&output);
    assert_eq!(envelope["metadata"]["truncated"], true);
    assert!(envelope["output"].as_str().unwrap().contains("[... omitted "));

    match &output {
        ToolOutput::Function { metadata, .. } => {
            let spool = metadata
                .as_ref()
                .and_then(|meta| meta.get("full_output_path"))
                .and_then(|path| path.as_str())
                .expect("spool path missing");
            let full = std::fs::read_to_string(spool).unwrap();
            assert!(full.contains("\n2500\n"));
            assert!(full.ends_with("5000\n"));
        }
        other => panic!("expected function output, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_command_is_invalid() {
    let err = ShellHandler
        .handle(invocation(serde_json::json!({"command": []})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn read_only_classification() {
    let ro = |parts: &[&str]| {
        is_read_only_command(
            &parts
                .iter()
                .map(|part| part.to_string())
                .collect::<Vec<_>>(),
        )
    };
    assert!(ro(&["ls", "-la"]));
    assert!(ro(&["/bin/cat", "file.txt"]));
    assert!(ro(&["git", "status"]));
    assert!(!ro(&["git", "push"]));
    assert!(!ro(&["touch", "x"]));
    assert!(!ro(&[]));
}
