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

fn invocation_in(dir: &Path, patch: &str) -> ToolInvocation {
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
        tool_name: "apply_patch".to_string(),
        payload: ToolPayload::Function {
            raw_arguments: serde_json::json!({"input": patch}).to_string(),
        },
    }
}

#[tokio::test]
async fn add_update_delete_in_one_patch() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keep.txt"), "old line\n").unwrap();
    std::fs::write(dir.path().join("gone.txt"), "bye\n").unwrap();

    let patch = "*** Begin Patch\n\
        *** Add File: fresh.txt\n\
        +brand new\n\
        *** Update File: keep.txt\n\
        @@\n\
        -old line\n\
        +new line\n\
        *** Delete File: gone.txt\n\
        *** End Patch";
    let invocation = invocation_in(dir.path(), patch);
    let tracker = Arc::clone(&invocation.tracker);

    let output = ApplyPatchHandler.handle(invocation).await.unwrap();
    assert!(output.success());
    assert!(output.content_text().contains("A "));
    assert!(output.content_text().contains("M "));
    assert!(output.content_text().contains("D "));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("fresh.txt")).unwrap(),
        "brand new\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("keep.txt")).unwrap(),
        "new line\n"
    );
    assert!(!dir.path().join("gone.txt").exists());
    assert!(tracker.locked_paths().is_empty());
    assert_eq!(tracker.written_paths().len(), 3);
}

#[tokio::test]
async fn external_write_between_read_and_patch_is_a_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("src.rs");
    std::fs::write(&path, "fn a() {}\n").unwrap();

    let patch = "*** Begin Patch\n\
        *** Update File: src.rs\n\
        @@\n\
        -fn a() {}\n\
        +fn a() { fixed(); }\n\
        *** End Patch";
    let invocation = invocation_in(dir.path(), patch);

    // Read recorded, then the file changes under us.
    invocation
        .tracker
        .record_read(&path, "read_file", Some(sha256_hex("fn a() {}\n")));
    std::fs::write(&path, "fn a() { external(); }\n").unwrap();

    let tracker = Arc::clone(&invocation.tracker);
    let err = ApplyPatchHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("conflict"));

    // The tracker holds a descriptor and the file is unchanged.
    assert_eq!(tracker.conflicts().len(), 1);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "fn a() { external(); }\n"
    );
    assert!(tracker.locked_paths().is_empty());
}

#[tokio::test]
async fn stale_pre_image_in_the_patch_is_a_conflict() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("src.rs"), "actual content\n").unwrap();

    let patch = "*** Begin Patch\n\
        *** Update File: src.rs\n\
        @@\n\
        -content the model imagined\n\
        +anything\n\
        *** End Patch";
    let invocation = invocation_in(dir.path(), patch);
    let tracker = Arc::clone(&invocation.tracker);

    let err = ApplyPatchHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src.rs")).unwrap(),
        "actual content\n"
    );
    assert!(!tracker.conflicts().is_empty());
}

#[tokio::test]
async fn move_to_renames_and_records() {
    let dir = tempfile::tempdir().unwrap();
    let old_path = dir.path().join("old.rs");
    std::fs::write(&old_path, "body\n").unwrap();

    let patch = "*** Begin Patch\n\
        *** Update File: old.rs\n\
        *** Move to: new.rs\n\
        @@\n\
        -body\n\
        +body two\n\
        *** End Patch";
    let invocation = invocation_in(dir.path(), patch);
    let tracker = Arc::clone(&invocation.tracker);

    ApplyPatchHandler.handle(invocation).await.unwrap();
    assert!(!old_path.exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("new.rs")).unwrap(),
        "body two\n"
    );
    let summary = tracker.summary();
    assert!(summary.contains("rename ->"), "summary: {summary}");
}

#[tokio::test]
async fn adding_an_existing_file_is_a_conflict() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("here.txt"), "present\n").unwrap();

    let patch = "*** Begin Patch\n\
        *** Add File: here.txt\n\
        +clobber\n\
        *** End Patch";
    let invocation = invocation_in(dir.path(), patch);
    let err = ApplyPatchHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("here.txt")).unwrap(),
        "present\n"
    );
}

#[tokio::test]
async fn custom_payload_carries_the_patch_directly() {
    let dir = tempfile::tempdir().unwrap();
    let patch = "*** Begin Patch\n\
        *** Add File: direct.txt\n\
        +from custom payload\n\
        *** End Patch";
    let policy = ExecutionPolicy {
        approval: ApprovalPolicy::Never,
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
        tool_name: "apply_patch".to_string(),
        payload: ToolPayload::Custom {
            name: "apply_patch".to_string(),
            raw_input: patch.to_string(),
        },
    };

    ApplyPatchHandler.handle(invocation).await.unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("direct.txt")).unwrap(),
        "from custom payload\n"
    );
}

#[tokio::test]
async fn undo_after_patch_restores_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "v1\n").unwrap();

    let patch = "*** Begin Patch\n\
        *** Update File: a.txt\n\
        @@\n\
        -v1\n\
        +v2\n\
        *** Add File: b.txt\n\
        +created\n\
        *** End Patch";
    let invocation = invocation_in(dir.path(), patch);
    let tracker = Arc::clone(&invocation.tracker);

    ApplyPatchHandler.handle(invocation).await.unwrap();
    let report = tracker.undo().unwrap();
    assert!(report.failures.is_empty(), "failures: {:?}", report.failures);

    assert_eq!(
        std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "v1\n"
    );
    assert!(!dir.path().join("b.txt").exists());
    assert!(tracker.locked_paths().is_empty());
}
