use super::*;
use crucible_tools::SpecRegistry;
use crucible_tools::TelemetrySink;
use crucible_tools::ToolRegistry;
use crucible_tools::context::TurnContextBuilder;
use crucible_tools::handlers;
use crucible_tracker::TurnDiffTracker;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

fn driver() -> (TurnDriver, mpsc::UnboundedReceiver<SessionEvent>) {
    let mut registry = ToolRegistry::new(TelemetrySink::new());
    handlers::register_builtins(&mut registry);
    let router = Arc::new(ToolRouter::new(
        Arc::new(SpecRegistry::with_builtins()),
        registry,
    ));
    let runtime = ToolCallRuntime::new(Arc::clone(&router));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    (TurnDriver::new(router, runtime, events_tx), events_rx)
}

fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input,
    }
}

#[test]
fn collect_calls_skips_text_blocks() {
    let (driver, _events) = driver();
    let blocks = vec![
        ContentBlock::Text {
            text: "let me look".to_string(),
        },
        tool_use("call-1", "read_file", serde_json::json!({"file_path": "a"})),
        tool_use("call-2", "shell", serde_json::json!({"command": ["ls"]})),
    ];
    let calls = driver.collect_calls(&blocks).unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].call_id, "call-1");
    assert_eq!(calls[1].call_id, "call-2");
}

#[tokio::test]
async fn batch_emits_begin_and_end_events_and_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();
    std::fs::write(dir.path().join("b.txt"), "beta\n").unwrap();

    let (driver, mut events) = driver();
    let turn = Arc::new(TurnContextBuilder::new("turn-1", dir.path()).build());
    let tracker = Arc::new(TurnDiffTracker::new("turn-1"));

    let calls = driver
        .collect_calls(&[
            tool_use(
                "call-a",
                "read_file",
                serde_json::json!({"file_path": "a.txt"}),
            ),
            tool_use(
                "call-b",
                "read_file",
                serde_json::json!({"file_path": "b.txt"}),
            ),
        ])
        .unwrap();

    let blocks = driver
        .run_tool_batch(turn, tracker, "sub-1", calls, CancellationToken::new())
        .await
        .unwrap();

    // Results in tool-use order.
    let ids: Vec<&str> = blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec!["call-a", "call-b"]);

    // Two begins, then two ends keyed by call id.
    let mut begins = 0;
    let mut ends = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::ToolCallBegin { name, .. } => {
                begins += 1;
                assert_eq!(name, "read_file");
            }
            SessionEvent::ToolCallEnd { success, .. } => {
                ends += 1;
                assert!(success);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(begins, 2);
    assert_eq!(ends, 2);
}

#[tokio::test]
async fn failed_calls_emit_unsuccessful_ends() {
    let dir = tempfile::tempdir().unwrap();
    let (driver, mut events) = driver();
    let turn = Arc::new(TurnContextBuilder::new("turn-1", dir.path()).build());
    let tracker = Arc::new(TurnDiffTracker::new("turn-1"));

    let calls = driver
        .collect_calls(&[tool_use(
            "call-missing",
            "read_file",
            serde_json::json!({"file_path": "absent.txt"}),
        )])
        .unwrap();
    let blocks = driver
        .run_tool_batch(turn, tracker, "sub-1", calls, CancellationToken::new())
        .await
        .unwrap();

    match &blocks[0] {
        ContentBlock::ToolResult { is_error, .. } => assert!(is_error),
        other => panic!("unexpected block: {other:?}"),
    }
    let mut saw_failed_end = false;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::ToolCallEnd { success, .. } = event {
            saw_failed_end = !success;
        }
    }
    assert!(saw_failed_end);
}
