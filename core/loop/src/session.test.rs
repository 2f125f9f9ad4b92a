use super::*;
use crucible_context::CompactionOutcome;
use crucible_protocol::ContentBlock;
use crucible_protocol::Role;
use pretty_assertions::assert_eq;

fn session_in(dir: &std::path::Path) -> Session {
    SessionBuilder::new(Config::default(), dir).build()
}

fn assistant_tool_use(calls: Vec<(&str, &str, serde_json::Value)>) -> Message {
    let mut content = vec![ContentBlock::Text {
        text: "working on it".to_string(),
    }];
    for (id, name, input) in calls {
        content.push(ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        });
    }
    Message {
        role: Role::Assistant,
        content,
    }
}

fn result_blocks(outcome: &TurnOutcome) -> &[ContentBlock] {
    match outcome {
        TurnOutcome::ToolResults(blocks) => blocks,
        other => panic!("expected tool results, got {other:?}"),
    }
}

#[tokio::test]
async fn shell_echo_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());

    session.submit_user_turn("run echo").unwrap();
    let outcome = session
        .process_assistant_message(assistant_tool_use(vec![(
            "call-1",
            "shell",
            serde_json::json!({"command": ["/bin/echo", "tool harness"]}),
        )]))
        .await
        .unwrap();

    let blocks = result_blocks(&outcome);
    assert_eq!(blocks.len(), 1);
    match &blocks[0] {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            assert_eq!(tool_use_id, "call-1");
            assert!(!is_error);
            let envelope: serde_json::Value = serde_json::from_str(content).unwrap();
            assert_eq!(envelope["metadata"]["exit_code"], 0);
            assert_eq!(envelope["metadata"]["truncated"], false);
            assert!(envelope["output"].as_str().unwrap().starts_with("tool harness"));
        }
        other => panic!("unexpected block: {other:?}"),
    }

    // Exactly one matching tool_result landed in history.
    assert!(!session.history().has_outstanding_tool_uses());
    let last = session.history().messages().last().unwrap();
    assert_eq!(last.tool_result_ids(), vec!["call-1"]);

    // Events narrate the turn.
    let mut saw_begin = false;
    let mut saw_end = false;
    while let Some(event) = session.try_next_event() {
        match event {
            SessionEvent::TaskStarted { .. } => {}
            SessionEvent::ToolCallBegin { call_id, .. } => saw_begin = call_id == "call-1",
            SessionEvent::ToolCallEnd { success, .. } => saw_end = success,
            _ => {}
        }
    }
    assert!(saw_begin);
    assert!(saw_end);
}

#[tokio::test]
async fn text_only_assistant_message_completes_the_turn() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());

    session.submit_user_turn("hello").unwrap();
    let outcome = session
        .process_assistant_message(Message::assistant_text("hi there"))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    let mut saw_complete = false;
    while let Some(event) = session.try_next_event() {
        if matches!(event, SessionEvent::TaskComplete { .. }) {
            saw_complete = true;
        }
    }
    assert!(saw_complete);
}

#[tokio::test]
async fn parallel_reads_return_in_tool_use_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("first.txt"), "contents of first\n").unwrap();
    std::fs::write(dir.path().join("second.txt"), "contents of second\n").unwrap();
    let mut session = session_in(dir.path());

    session.submit_user_turn("read both files").unwrap();
    let outcome = session
        .process_assistant_message(assistant_tool_use(vec![
            (
                "call-first",
                "read_file",
                serde_json::json!({"file_path": "first.txt"}),
            ),
            (
                "call-second",
                "read_file",
                serde_json::json!({"file_path": "second.txt"}),
            ),
        ]))
        .await
        .unwrap();

    let blocks = result_blocks(&outcome);
    let ids: Vec<&str> = blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec!["call-first", "call-second"]);
}

#[tokio::test]
async fn undo_reverses_a_whole_turn() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());

    session.submit_user_turn("set up files").unwrap();
    session
        .process_assistant_message(assistant_tool_use(vec![
            (
                "call-1",
                "write_file",
                serde_json::json!({"file_path": "a.txt", "content": "v1"}),
            ),
            (
                "call-2",
                "write_file",
                serde_json::json!({"file_path": "a.txt", "content": "v2"}),
            ),
            (
                "call-3",
                "write_file",
                serde_json::json!({"file_path": "b.txt", "content": "bee"}),
            ),
        ]))
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "v2"
    );

    let report = session.undo_turn().unwrap().unwrap();
    assert!(report.failures.is_empty(), "failures: {:?}", report.failures);
    assert!(!dir.path().join("a.txt").exists());
    assert!(!dir.path().join("b.txt").exists());

    // No residual locks on the turn's tracker.
    assert!(session.last_tracker().unwrap().locked_paths().is_empty());
}

#[tokio::test]
async fn interrupt_mid_batch_cancels_and_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());

    session.submit_user_turn("sleep a while").unwrap();
    let interrupts = std::sync::Arc::clone(session.interrupts());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        interrupts.fire();
    });

    let outcome = session
        .process_assistant_message(assistant_tool_use(vec![(
            "call-sleep",
            "shell",
            serde_json::json!({"command": ["/bin/sleep", "30"]}),
        )]))
        .await
        .unwrap();

    let blocks = result_blocks(&outcome);
    match &blocks[0] {
        ContentBlock::ToolResult {
            content, is_error, ..
        } => {
            assert!(is_error);
            assert!(content.contains("cancelled"), "content: {content}");
        }
        other => panic!("unexpected block: {other:?}"),
    }

    // The next turn proceeds normally.
    session.submit_user_turn("try again").unwrap();
    let outcome = session
        .process_assistant_message(assistant_tool_use(vec![(
            "call-echo",
            "shell",
            serde_json::json!({"command": ["/bin/echo", "recovered"]}),
        )]))
        .await
        .unwrap();
    match &result_blocks(&outcome)[0] {
        ContentBlock::ToolResult { is_error, .. } => assert!(!is_error),
        other => panic!("unexpected block: {other:?}"),
    }
}

#[tokio::test]
async fn forced_compaction_preserves_pins_and_emits_event() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    session.pin(crucible_context::Pin::new("standards", "tabs are forbidden"));

    for index in 0..6 {
        session
            .submit_user_turn(format!("question {index}: {}", "filler ".repeat(80)))
            .unwrap();
        session
            .process_assistant_message(Message::assistant_text(format!(
                "answer {index}: {}",
                "detail ".repeat(80)
            )))
            .await
            .unwrap();
    }

    let outcome = session.compact(true, None).await.unwrap();
    assert!(matches!(outcome, CompactionOutcome::Compacted { .. }));

    let text = session
        .history()
        .messages()
        .iter()
        .map(Message::text)
        .collect::<Vec<_>>()
        .join("\n");
    assert!(text.contains("Previous conversation summary:"));
    assert!(text.contains("[standards] tabs are forbidden"));

    let mut saw_compaction = false;
    while let Some(event) = session.try_next_event() {
        if let SessionEvent::Compaction {
            pre_tokens,
            post_tokens,
        } = event
        {
            saw_compaction = true;
            assert!(post_tokens < pre_tokens);
        }
    }
    assert!(saw_compaction);
}

#[tokio::test]
async fn close_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    session.close().await;
    session.close().await;
}

#[tokio::test]
async fn unknown_tool_calls_respond_to_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());

    session.submit_user_turn("use a made-up tool").unwrap();
    let outcome = session
        .process_assistant_message(assistant_tool_use(vec![(
            "call-ghost",
            "imaginary_tool",
            serde_json::json!({}),
        )]))
        .await
        .unwrap();

    match &result_blocks(&outcome)[0] {
        ContentBlock::ToolResult {
            content, is_error, ..
        } => {
            assert!(is_error);
            assert!(content.contains("unsupported tool"));
        }
        other => panic!("unexpected block: {other:?}"),
    }
    // The turn can continue: the history has no dangling tool uses.
    assert!(!session.history().has_outstanding_tool_uses());
}
