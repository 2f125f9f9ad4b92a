use super::*;
use crate::context::TurnContextBuilder;
use crate::handler::ToolHandler;
use crucible_error::ErrorKind;
use crucible_tracker::FileAction;
use crucible_tracker::TurnDiffTracker;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn invocation_in(dir: &std::path::Path, arguments: serde_json::Value) -> ToolInvocation {
    ToolInvocation {
        turn: Arc::new(TurnContextBuilder::new("turn-1", dir).build()),
        tracker: Arc::new(TurnDiffTracker::new("turn-1")),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: "read_file".to_string(),
        payload: ToolPayload::Function {
            raw_arguments: arguments.to_string(),
        },
    }
}

#[tokio::test]
async fn reads_whole_file_and_records_the_hash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "alpha\nbeta\n").unwrap();

    let invocation = invocation_in(dir.path(), serde_json::json!({"file_path": "notes.txt"}));
    let tracker = Arc::clone(&invocation.tracker);
    let output = ReadFileHandler.handle(invocation).await.unwrap();

    assert_eq!(output.content_text(), "alpha\nbeta\n");
    let edits = tracker.edits_for(&path);
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].action, FileAction::Read);
    assert_eq!(
        edits[0].old_hash.as_deref(),
        Some(crucible_tracker::sha256_hex("alpha\nbeta\n").as_str())
    );
}

#[tokio::test]
async fn line_window_selects_offset_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lines.txt");
    std::fs::write(&path, "one\ntwo\nthree\nfour\n").unwrap();

    let invocation = invocation_in(
        dir.path(),
        serde_json::json!({"file_path": "lines.txt", "offset": 2, "limit": 2}),
    );
    let output = ReadFileHandler.handle(invocation).await.unwrap();
    assert_eq!(output.content_text(), "two\nthree\n");
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = invocation_in(dir.path(), serde_json::json!({"file_path": "absent.txt"}));
    let err = ReadFileHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn empty_path_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = invocation_in(dir.path(), serde_json::json!({"file_path": "  "}));
    let err = ReadFileHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn oversized_content_is_truncated_with_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.txt");
    let content: String = (0..2000).map(|n| format!("line {n}\n")).collect();
    std::fs::write(&path, &content).unwrap();

    let invocation = invocation_in(dir.path(), serde_json::json!({"file_path": "big.txt"}));
    let output = ReadFileHandler.handle(invocation).await.unwrap();
    match &output {
        ToolOutput::Function {
            content, metadata, ..
        } => {
            assert!(content.len() <= crate::truncate::MAX_BYTES);
            assert!(content.contains("[... omitted "));
            assert_eq!(
                metadata.as_ref().and_then(|meta| meta.get("truncated")),
                Some(&serde_json::Value::Bool(true))
            );
        }
        other => panic!("expected function output, got {other:?}"),
    }
}
