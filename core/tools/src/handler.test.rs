use super::*;
use crucible_protocol::ShellCallParams;

struct FunctionOnly;

#[async_trait::async_trait]
impl ToolHandler for FunctionOnly {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, _invocation: ToolInvocation) -> Result<ToolOutput> {
        Ok(ToolOutput::text("ok"))
    }
}

#[test]
fn default_matching_accepts_only_own_kind() {
    let handler = FunctionOnly;
    assert!(handler.matches_kind(&ToolPayload::Function {
        raw_arguments: "{}".to_string(),
    }));
    assert!(!handler.matches_kind(&ToolPayload::Mcp {
        server: "docs".to_string(),
        tool: "search".to_string(),
        raw_arguments: "{}".to_string(),
    }));
    assert!(!handler.matches_kind(&ToolPayload::LocalShell {
        params: ShellCallParams {
            command: vec!["ls".to_string()],
            workdir: None,
            timeout_ms: None,
            with_escalated_permissions: None,
            justification: None,
        },
    }));
    assert!(!handler.matches_kind(&ToolPayload::Custom {
        name: "x".to_string(),
        raw_input: String::new(),
    }));
}
