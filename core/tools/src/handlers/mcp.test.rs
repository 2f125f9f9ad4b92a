use super::*;
use crate::context::TurnContextBuilder;
use crate::handler::ToolHandler;
use crucible_config::McpServerConfig;
use crucible_error::ErrorKind;
use crucible_mcp::ClientFactory;
use crucible_mcp::McpClient;
use crucible_mcp::McpPool;
use crucible_protocol::CallToolResult;
use crucible_protocol::McpToolInfo;
use crucible_tracker::TurnDiffTracker;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Client generation N fails transport for the first `failing_generations`.
struct FlakyClient {
    generation: usize,
    failing_generations: usize,
}

#[async_trait::async_trait]
impl McpClient for FlakyClient {
    async fn list_tools(&self) -> crucible_mcp::Result<Vec<McpToolInfo>> {
        Ok(Vec::new())
    }

    async fn call_tool(
        &self,
        tool: &str,
        _arguments: serde_json::Value,
    ) -> crucible_mcp::Result<CallToolResult> {
        if self.generation < self.failing_generations {
            return Err(crucible_mcp::McpError::Transport {
                server: "docs".to_string(),
                message: "socket closed".to_string(),
            });
        }
        Ok(CallToolResult::text_result(format!("{tool} ok")))
    }

    async fn shutdown(&self, _grace: Duration) {}
}

fn pool_failing(failing_generations: usize) -> (Arc<McpPool>, Arc<AtomicUsize>) {
    let spawned = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&spawned);
    let factory: ClientFactory = Arc::new(move |_definition: McpServerConfig| {
        let generation = counter.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Ok(Arc::new(FlakyClient {
                generation,
                failing_generations,
            }) as Arc<dyn McpClient>)
        })
    });
    let definitions = vec![McpServerConfig {
        name: "docs".to_string(),
        command: "stub".to_string(),
        args: Vec::new(),
        env: Default::default(),
        ttl_seconds: None,
    }];
    (Arc::new(McpPool::new(definitions, factory)), spawned)
}

fn invocation_with(pool: Arc<McpPool>, server: &str, tool: &str) -> ToolInvocation {
    let turn = TurnContextBuilder::new("turn-1", "/work").mcp(pool).build();
    ToolInvocation {
        turn: Arc::new(turn),
        tracker: Arc::new(TurnDiffTracker::new("turn-1")),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: format!("{server}/{tool}"),
        payload: ToolPayload::Mcp {
            server: server.to_string(),
            tool: tool.to_string(),
            raw_arguments: "{}".to_string(),
        },
    }
}

#[tokio::test]
async fn healthy_client_forwards_the_call() {
    let (pool, spawned) = pool_failing(0);
    let output = McpHandler
        .handle(invocation_with(pool, "docs", "search"))
        .await
        .unwrap();
    assert_eq!(output.content_text(), "search ok");
    assert!(output.success());
    assert_eq!(spawned.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transport_error_retries_once_with_a_fresh_client() {
    let (pool, spawned) = pool_failing(1);
    let output = McpHandler
        .handle(invocation_with(Arc::clone(&pool), "docs", "search"))
        .await
        .unwrap();
    assert_eq!(output.content_text(), "search ok");
    // First client failed, second succeeded.
    assert_eq!(spawned.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn second_transport_failure_is_transient() {
    let (pool, spawned) = pool_failing(2);
    let err = McpHandler
        .handle(invocation_with(pool, "docs", "search"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    // Exactly one retry: two clients total, no third attempt.
    assert_eq!(spawned.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_server_is_not_found() {
    let (pool, _) = pool_failing(0);
    let err = McpHandler
        .handle(invocation_with(pool, "ghost", "search"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn malformed_arguments_are_validation_errors() {
    let (pool, _) = pool_failing(0);
    let turn = TurnContextBuilder::new("turn-1", "/work").mcp(pool).build();
    let invocation = ToolInvocation {
        turn: Arc::new(turn),
        tracker: Arc::new(TurnDiffTracker::new("turn-1")),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: "docs/search".to_string(),
        payload: ToolPayload::Mcp {
            server: "docs".to_string(),
            tool: "search".to_string(),
            raw_arguments: "{not json".to_string(),
        },
    };
    let err = McpHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
