use super::*;
use crate::context::TurnContextBuilder;
use crate::handler::ToolHandler;
use crate::handler::ToolKind;
use crate::spec::SpecRegistry;
use crate::telemetry::TelemetrySink;
use crucible_error::ErrorKind;
use crucible_protocol::ShellCallParams;
use crucible_protocol::ToolOutput;
use crucible_tracker::TurnDiffTracker;
use pretty_assertions::assert_eq;

struct NotFoundHandler;

#[async_trait::async_trait]
impl ToolHandler for NotFoundHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, _invocation: ToolInvocation) -> Result<ToolOutput> {
        Err(tool_error::NotFoundSnafu {
            message: "file not found: /tmp/missing",
        }
        .build())
    }
}

struct SandboxHandler;

#[async_trait::async_trait]
impl ToolHandler for SandboxHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, _invocation: ToolInvocation) -> Result<ToolOutput> {
        Err(tool_error::SandboxSnafu {
            message: "blocked command",
        }
        .build())
    }
}

fn router_with(handlers: Vec<(&str, Arc<dyn ToolHandler>)>) -> ToolRouter {
    let mut registry = ToolRegistry::new(TelemetrySink::new());
    for (name, handler) in handlers {
        registry.register(name, handler);
    }
    ToolRouter::new(Arc::new(SpecRegistry::with_builtins()), registry)
}

fn shell_action(command: &[&str]) -> ShellCallParams {
    ShellCallParams {
        command: command.iter().map(|part| part.to_string()).collect(),
        workdir: None,
        timeout_ms: None,
        with_escalated_permissions: None,
        justification: None,
    }
}

#[test]
fn tool_use_parses_to_function_payload() {
    let router = router_with(vec![]);
    let block = ContentBlock::ToolUse {
        id: "call-1".to_string(),
        name: "read_file".to_string(),
        input: serde_json::json!({"file_path": "a.txt"}),
    };
    let call = router.build_tool_call(&block).unwrap().unwrap();
    assert_eq!(call.tool_name, "read_file");
    assert_eq!(call.call_id, "call-1");
    match call.payload {
        ToolPayload::Function { raw_arguments } => {
            assert!(raw_arguments.contains("a.txt"));
        }
        other => panic!("expected function payload, got {other:?}"),
    }
}

#[test]
fn single_slash_names_parse_to_mcp_payload() {
    let router = router_with(vec![]);
    let block = ContentBlock::ToolUse {
        id: "call-2".to_string(),
        name: "docs/search".to_string(),
        input: serde_json::json!({"query": "rwlock"}),
    };
    let call = router.build_tool_call(&block).unwrap().unwrap();
    match call.payload {
        ToolPayload::Mcp { server, tool, .. } => {
            assert_eq!(server, "docs");
            assert_eq!(tool, "search");
        }
        other => panic!("expected mcp payload, got {other:?}"),
    }
}

#[test]
fn multi_slash_names_stay_function_calls() {
    let router = router_with(vec![]);
    let block = ContentBlock::ToolUse {
        id: "call-3".to_string(),
        name: "a/b/c".to_string(),
        input: serde_json::json!({}),
    };
    let call = router.build_tool_call(&block).unwrap().unwrap();
    assert!(matches!(call.payload, ToolPayload::Function { .. }));
}

#[test]
fn local_shell_call_accepts_call_id_or_id() {
    let router = router_with(vec![]);

    let with_call_id = ContentBlock::LocalShellCall {
        id: None,
        call_id: Some("call-4".to_string()),
        action: shell_action(&["ls"]),
    };
    let call = router.build_tool_call(&with_call_id).unwrap().unwrap();
    assert_eq!(call.call_id, "call-4");
    assert_eq!(call.tool_name, "shell");

    let with_id = ContentBlock::LocalShellCall {
        id: Some("call-5".to_string()),
        call_id: None,
        action: shell_action(&["ls"]),
    };
    let call = router.build_tool_call(&with_id).unwrap().unwrap();
    assert_eq!(call.call_id, "call-5");
}

#[test]
fn local_shell_call_without_any_id_is_fatal() {
    let router = router_with(vec![]);
    let block = ContentBlock::LocalShellCall {
        id: None,
        call_id: None,
        action: shell_action(&["ls"]),
    };
    let err = router.build_tool_call(&block).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.is_fatal());
}

#[test]
fn custom_tool_call_parses_to_custom_payload() {
    let router = router_with(vec![]);
    let block = ContentBlock::CustomToolCall {
        id: "call-6".to_string(),
        name: "apply_patch".to_string(),
        input: "*** Begin Patch".to_string(),
    };
    let call = router.build_tool_call(&block).unwrap().unwrap();
    assert!(matches!(call.payload, ToolPayload::Custom { .. }));
}

#[test]
fn text_blocks_produce_no_call() {
    let router = router_with(vec![]);
    let block = ContentBlock::Text {
        text: "thinking...".to_string(),
    };
    assert!(router.build_tool_call(&block).unwrap().is_none());
}

#[test]
fn parallel_support_comes_from_the_spec_table() {
    let router = router_with(vec![]);
    assert!(router.tool_supports_parallel("read_file"));
    assert!(!router.tool_supports_parallel("shell"));
    assert!(!router.tool_supports_parallel("unknown"));
}

#[tokio::test]
async fn respond_to_model_errors_become_error_results() {
    let router = router_with(vec![("missing", Arc::new(NotFoundHandler))]);
    let turn = Arc::new(TurnContextBuilder::new("turn-1", "/work").build());
    let tracker = Arc::new(TurnDiffTracker::new("turn-1"));
    let call = ToolCall {
        tool_name: "missing".to_string(),
        call_id: "call-7".to_string(),
        payload: ToolPayload::Function {
            raw_arguments: "{}".to_string(),
        },
    };

    let block = router
        .dispatch_tool_call(turn, tracker, "sub-1", call)
        .await
        .unwrap();
    match block {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            assert_eq!(tool_use_id, "call-7");
            assert!(is_error);
            assert!(content.contains("not found"));
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn fatal_errors_propagate() {
    let router = router_with(vec![("blocked", Arc::new(SandboxHandler))]);
    let turn = Arc::new(TurnContextBuilder::new("turn-1", "/work").build());
    let tracker = Arc::new(TurnDiffTracker::new("turn-1"));
    let call = ToolCall {
        tool_name: "blocked".to_string(),
        call_id: "call-8".to_string(),
        payload: ToolPayload::Function {
            raw_arguments: "{}".to_string(),
        },
    };

    let err = router
        .dispatch_tool_call(turn, tracker, "sub-1", call)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Sandbox);
}
