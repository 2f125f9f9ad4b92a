use super::*;
use async_trait::async_trait;
use crucible_protocol::CallToolResult;
use crucible_protocol::McpToolInfo;
use pretty_assertions::assert_eq;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

struct StubClient {
    server: String,
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl McpClient for StubClient {
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>> {
        Ok(vec![McpToolInfo {
            name: "echo".to_string(),
            description: None,
            input_schema: serde_json::json!({"type": "object"}),
        }])
    }

    async fn call_tool(
        &self,
        tool: &str,
        _arguments: serde_json::Value,
    ) -> Result<CallToolResult> {
        Ok(CallToolResult::text_result(format!(
            "{}::{tool}",
            self.server
        )))
    }

    async fn shutdown(&self, _grace: Duration) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

fn definition(name: &str, ttl_seconds: Option<u64>) -> McpServerConfig {
    McpServerConfig {
        name: name.to_string(),
        command: "stub".to_string(),
        args: Vec::new(),
        env: Default::default(),
        ttl_seconds,
    }
}

fn pool_with(
    definitions: Vec<McpServerConfig>,
) -> (McpPool, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let spawns = Arc::new(AtomicUsize::new(0));
    let shutdowns = Arc::new(AtomicUsize::new(0));
    let factory_spawns = Arc::clone(&spawns);
    let factory_shutdowns = Arc::clone(&shutdowns);
    let factory: ClientFactory = Arc::new(move |definition: McpServerConfig| {
        let spawns = Arc::clone(&factory_spawns);
        let shutdowns = Arc::clone(&factory_shutdowns);
        Box::pin(async move {
            spawns.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubClient {
                server: definition.name,
                shutdowns,
            }) as Arc<dyn McpClient>)
        })
    });
    (McpPool::new(definitions, factory), spawns, shutdowns)
}

#[tokio::test]
async fn unknown_server_is_an_error() {
    let (pool, _, _) = pool_with(vec![]);
    assert!(matches!(
        pool.get_client("ghost").await,
        Err(McpError::UnknownServer { .. })
    ));
}

#[tokio::test]
async fn client_is_created_once_and_reused() {
    let (pool, spawns, _) = pool_with(vec![definition("docs", None)]);
    let first = pool.get_client("docs").await.unwrap();
    let second = pool.get_client("docs").await.unwrap();
    assert_eq!(spawns.load(Ordering::SeqCst), 1);
    assert_eq!(pool.pooled_count().await, 1);

    let result = first.call_tool("echo", serde_json::json!({})).await.unwrap();
    assert_eq!(result.text(), "docs::echo");
    drop(second);
}

#[tokio::test]
async fn mark_unhealthy_evicts_and_shuts_down() {
    let (pool, spawns, shutdowns) = pool_with(vec![definition("docs", None)]);
    pool.get_client("docs").await.unwrap();
    pool.mark_unhealthy("docs").await;
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(pool.pooled_count().await, 0);

    // Next access creates a fresh client.
    pool.get_client("docs").await.unwrap();
    assert_eq!(spawns.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_ttl_recreates_the_client() {
    let (pool, spawns, _) = pool_with(vec![definition("docs", Some(0))]);
    pool.get_client("docs").await.unwrap();
    // ttl_seconds = 0 expires immediately.
    pool.get_client("docs").await.unwrap();
    assert_eq!(spawns.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn close_all_drains_the_pool() {
    let (pool, _, shutdowns) = pool_with(vec![definition("a", None), definition("b", None)]);
    pool.get_client("a").await.unwrap();
    pool.get_client("b").await.unwrap();
    pool.close_all(Duration::from_secs(1)).await;
    assert_eq!(shutdowns.load(Ordering::SeqCst), 2);
    assert_eq!(pool.pooled_count().await, 0);
}
