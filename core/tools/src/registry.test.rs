use super::*;
use crate::context::TurnContextBuilder;
use crate::error::ToolError;
use crate::handler::ToolKind;
use crucible_error::ErrorKind;
use crucible_protocol::ToolPayload;
use crucible_tracker::TurnDiffTracker;
use pretty_assertions::assert_eq;

struct EchoHandler;

#[async_trait::async_trait]
impl ToolHandler for EchoHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, invocation: ToolInvocation) -> crate::error::Result<ToolOutput> {
        match invocation.payload {
            ToolPayload::Function { raw_arguments } => Ok(ToolOutput::text(raw_arguments)),
            _ => unreachable!("registry checks payload kind first"),
        }
    }
}

struct FailingHandler;

#[async_trait::async_trait]
impl ToolHandler for FailingHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, _invocation: ToolInvocation) -> crate::error::Result<ToolOutput> {
        Err(crate::error::tool_error::PermissionSnafu {
            message: "denied by user",
        }
        .build())
    }
}

struct McpEcho;

#[async_trait::async_trait]
impl ToolHandler for McpEcho {
    fn kind(&self) -> ToolKind {
        ToolKind::Mcp
    }

    async fn handle(&self, _invocation: ToolInvocation) -> crate::error::Result<ToolOutput> {
        Ok(ToolOutput::text("mcp ok"))
    }
}

fn invocation(tool_name: &str, payload: ToolPayload) -> ToolInvocation {
    ToolInvocation {
        turn: Arc::new(TurnContextBuilder::new("turn-1", "/work").build()),
        tracker: Arc::new(TurnDiffTracker::new("turn-1")),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: tool_name.to_string(),
        payload,
    }
}

fn function_payload(arguments: &str) -> ToolPayload {
    ToolPayload::Function {
        raw_arguments: arguments.to_string(),
    }
}

#[tokio::test]
async fn unknown_tool_is_not_found() {
    let registry = ToolRegistry::new(TelemetrySink::new());
    let err = registry
        .dispatch(invocation("ghost", function_payload("{}")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn incompatible_payload_is_validation() {
    let mut registry = ToolRegistry::new(TelemetrySink::new());
    registry.register("echo", Arc::new(EchoHandler));
    let err = registry
        .dispatch(invocation(
            "echo",
            ToolPayload::Custom {
                name: "echo".to_string(),
                raw_input: "raw".to_string(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn success_records_telemetry() {
    let telemetry = TelemetrySink::new();
    let mut registry = ToolRegistry::new(telemetry.clone());
    registry.register("echo", Arc::new(EchoHandler));

    let output = registry
        .dispatch(invocation("echo", function_payload(r#"{"x":1}"#)))
        .await
        .unwrap();
    assert_eq!(output.content_text(), r#"{"x":1}"#);

    let events = telemetry.snapshot();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert!(event.success);
    assert_eq!(event.tool_name, "echo");
    assert_eq!(event.call_id, "call-1");
    assert_eq!(event.turn_id, "turn-1");
    assert_eq!(event.input_bytes, 7);
    assert_eq!(event.output_bytes, 7);
    assert!(event.error_kind.is_none());
}

#[tokio::test]
async fn failure_records_the_error_kind() {
    let telemetry = TelemetrySink::new();
    let mut registry = ToolRegistry::new(telemetry.clone());
    registry.register("always_fails", Arc::new(FailingHandler));

    let err = registry
        .dispatch(invocation("always_fails", function_payload("{}")))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Permission { .. }));

    let events = telemetry.snapshot();
    assert_eq!(events.len(), 1);
    assert!(!events[0].success);
    assert_eq!(events[0].error_kind.as_deref(), Some("permission"));
}

#[tokio::test]
async fn namespaced_names_fall_back_to_the_mcp_handler() {
    let mut registry = ToolRegistry::new(TelemetrySink::new());
    registry.register("mcp", Arc::new(McpEcho));

    let output = registry
        .dispatch(invocation(
            "docs/search",
            ToolPayload::Mcp {
                server: "docs".to_string(),
                tool: "search".to_string(),
                raw_arguments: "{}".to_string(),
            },
        ))
        .await
        .unwrap();
    assert_eq!(output.content_text(), "mcp ok");
}

#[tokio::test]
async fn reregistration_warns_and_last_wins() {
    let mut registry = ToolRegistry::new(TelemetrySink::new());
    registry.register("echo", Arc::new(FailingHandler));
    registry.register("echo", Arc::new(EchoHandler));
    let output = registry
        .dispatch(invocation("echo", function_payload("hi")))
        .await
        .unwrap();
    assert_eq!(output.content_text(), "hi");
}
