use super::*;
use crate::context::TurnContextBuilder;
use crate::handler::ToolHandler;
use crucible_error::ErrorKind;
use crucible_policy::ApprovalPolicy;
use crucible_policy::ExecutionPolicy;
use crucible_tracker::TurnDiffTracker;
use crucible_tracker::sha256_hex;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn invocation_in(dir: &Path, arguments: serde_json::Value) -> ToolInvocation {
    let policy = ExecutionPolicy {
        approval: ApprovalPolicy::Never,
        ..Default::default()
    };
    ToolInvocation {
        turn: Arc::new(
            TurnContextBuilder::new("turn-1", dir).policy(policy).build(),
        ),
        tracker: Arc::new(TurnDiffTracker::new("turn-1")),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: "write_file".to_string(),
        payload: ToolPayload::Function {
            raw_arguments: arguments.to_string(),
        },
    }
}

#[tokio::test]
async fn creates_a_new_file_and_records_create() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = invocation_in(
        dir.path(),
        serde_json::json!({"file_path": "sub/out.txt", "content": "hello\n"}),
    );
    let tracker = Arc::clone(&invocation.tracker);

    let output = WriteFileHandler.handle(invocation).await.unwrap();
    assert!(output.success());

    let path = dir.path().join("sub/out.txt");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    let edits = tracker.edits_for(&path);
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].action, FileAction::Create);
    assert!(edits[0].old_content.is_none());
    assert_eq!(edits[0].new_content.as_deref(), Some("hello\n"));
    // Lock released on the way out.
    assert!(tracker.locked_paths().is_empty());
}

#[tokio::test]
async fn overwrites_record_old_and_new_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    std::fs::write(&path, "before").unwrap();

    let invocation = invocation_in(
        dir.path(),
        serde_json::json!({"file_path": "out.txt", "content": "after"}),
    );
    let tracker = Arc::clone(&invocation.tracker);
    WriteFileHandler.handle(invocation).await.unwrap();

    let edits = tracker.edits_for(&path);
    assert_eq!(edits[0].action, FileAction::Update);
    assert_eq!(edits[0].old_content.as_deref(), Some("before"));
    assert_eq!(edits[0].new_content.as_deref(), Some("after"));
    assert_eq!(
        edits[0].old_hash.as_deref(),
        Some(sha256_hex("before").as_str())
    );
}

#[tokio::test]
async fn external_modification_since_read_is_a_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    std::fs::write(&path, "original").unwrap();

    let invocation = invocation_in(
        dir.path(),
        serde_json::json!({"file_path": "out.txt", "content": "mine"}),
    );
    // The turn read the file, then something else rewrote it.
    invocation
        .tracker
        .record_read(&path, "read_file", Some(sha256_hex("original")));
    std::fs::write(&path, "external change").unwrap();

    let tracker = Arc::clone(&invocation.tracker);
    let err = WriteFileHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    // File untouched, conflict recorded, lock released.
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "external change");
    assert_eq!(tracker.conflicts().len(), 1);
    assert!(tracker.locked_paths().is_empty());
}

#[tokio::test]
async fn locked_paths_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");

    let invocation = invocation_in(
        dir.path(),
        serde_json::json!({"file_path": "out.txt", "content": "x"}),
    );
    invocation.tracker.lock_file(&path).unwrap();

    let err = WriteFileHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn writes_outside_allowed_paths_are_sandbox_violations() {
    let dir = tempfile::tempdir().unwrap();
    let policy = ExecutionPolicy {
        approval: ApprovalPolicy::Never,
        allowed_paths: vec![dir.path().join("inside")],
        ..Default::default()
    };
    let invocation = ToolInvocation {
        turn: Arc::new(
            TurnContextBuilder::new("turn-1", dir.path())
                .policy(policy)
                .build(),
        ),
        tracker: Arc::new(TurnDiffTracker::new("turn-1")),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: "write_file".to_string(),
        payload: ToolPayload::Function {
            raw_arguments:
                serde_json::json!({"file_path": "/tmp/outside.txt", "content": "x"}).to_string(),
        },
    };

    let err = WriteFileHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Sandbox);
    assert!(err.is_fatal());
}
