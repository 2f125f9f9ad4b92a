use super::*;
use pretty_assertions::assert_eq;

fn tracker() -> TurnDiffTracker {
    TurnDiffTracker::new("turn-1")
}

#[test]
fn locking_a_locked_path_fails_fast() {
    let tracker = tracker();
    let path = Path::new("/work/a.txt");
    tracker.lock_file(path).unwrap();
    assert!(matches!(
        tracker.lock_file(path),
        Err(TrackerError::AlreadyLocked { .. })
    ));
    tracker.unlock_file(path);
    tracker.lock_file(path).unwrap();
}

#[test]
fn unlock_is_idempotent() {
    let tracker = tracker();
    let path = Path::new("/work/a.txt");
    tracker.unlock_file(path);
    tracker.lock_file(path).unwrap();
    tracker.unlock_file(path);
    tracker.unlock_file(path);
    assert!(tracker.locked_paths().is_empty());
}

#[test]
fn record_edit_detects_diverging_pre_image() {
    let tracker = tracker();
    let path = Path::new("/work/a.txt");
    tracker.record_edit(
        path,
        "write_file",
        FileAction::Create,
        None,
        Some("v1".to_string()),
    );
    // Second edit claims to start from content nobody wrote.
    tracker.record_edit(
        path,
        "apply_patch",
        FileAction::Update,
        Some("external".to_string()),
        Some("v2".to_string()),
    );
    let conflicts = tracker.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].contains("conflict on /work/a.txt"));
    // The edit itself is still in the trail.
    assert_eq!(tracker.edits_for(path).len(), 2);
}

#[test]
fn consistent_edit_chain_has_no_conflicts() {
    let tracker = tracker();
    let path = Path::new("/work/a.txt");
    tracker.record_edit(
        path,
        "write_file",
        FileAction::Create,
        None,
        Some("v1".to_string()),
    );
    tracker.record_edit(
        path,
        "write_file",
        FileAction::Update,
        Some("v1".to_string()),
        Some("v2".to_string()),
    );
    assert!(tracker.conflicts().is_empty());
}

#[test]
fn edits_for_preserves_order() {
    let tracker = tracker();
    let path = Path::new("/work/a.txt");
    tracker.record_read(path, "read_file", None);
    tracker.record_edit(
        path,
        "write_file",
        FileAction::Update,
        Some("v1".to_string()),
        Some("v2".to_string()),
    );
    let edits = tracker.edits_for(path);
    assert_eq!(edits.len(), 2);
    assert_eq!(edits[0].action, FileAction::Read);
    assert_eq!(edits[1].action, FileAction::Update);
}

#[test]
fn summary_groups_by_path() {
    let tracker = tracker();
    tracker.record_edit(
        Path::new("/work/b.txt"),
        "write_file",
        FileAction::Create,
        None,
        Some("b".to_string()),
    );
    tracker.record_read(Path::new("/work/a.txt"), "read_file", None);
    let summary = tracker.summary();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines, vec!["/work/a.txt: read", "/work/b.txt: create"]);
}

#[test]
fn unified_diff_spans_initial_to_final_content() {
    let tracker = tracker();
    let path = Path::new("src/main.rs");
    tracker.record_edit(
        path,
        "apply_patch",
        FileAction::Update,
        Some("fn main() {}\n".to_string()),
        Some("fn main() { run(); }\n".to_string()),
    );
    tracker.record_edit(
        path,
        "apply_patch",
        FileAction::Update,
        Some("fn main() { run(); }\n".to_string()),
        Some("fn main() { run(); cleanup(); }\n".to_string()),
    );
    let diff = tracker.unified_diff().unwrap();
    assert!(diff.contains("a/src/main.rs"));
    assert!(diff.contains("b/src/main.rs"));
    assert!(diff.contains("-fn main() {}"));
    assert!(diff.contains("+fn main() { run(); cleanup(); }"));
    // The intermediate state never appears.
    assert!(!diff.contains("+fn main() { run(); }\n+"));
}

#[test]
fn unified_diff_is_none_without_mutations() {
    let tracker = tracker();
    tracker.record_read(Path::new("/work/a.txt"), "read_file", None);
    assert!(tracker.unified_diff().is_none());
}

#[test]
fn undo_reverses_create_update_delete() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("nested").join("b.txt");

    let tracker = tracker();

    // create a.txt
    std::fs::write(&a, "v1").unwrap();
    tracker.record_edit(&a, "write_file", FileAction::Create, None, Some("v1".to_string()));

    // update a.txt
    std::fs::write(&a, "v2").unwrap();
    tracker.record_edit(
        &a,
        "write_file",
        FileAction::Update,
        Some("v1".to_string()),
        Some("v2".to_string()),
    );

    // create nested/b.txt, then delete it again
    std::fs::create_dir_all(b.parent().unwrap()).unwrap();
    std::fs::write(&b, "bee").unwrap();
    tracker.record_edit(&b, "write_file", FileAction::Create, None, Some("bee".to_string()));
    std::fs::remove_file(&b).unwrap();
    tracker.record_edit(
        &b,
        "apply_patch",
        FileAction::Delete,
        Some("bee".to_string()),
        None,
    );

    let report = tracker.undo().unwrap();
    assert!(report.failures.is_empty(), "failures: {:?}", report.failures);

    // a.txt was created this turn, so it is gone entirely.
    assert!(!a.exists());
    // b.txt: delete restored it, then the create reversal removed it.
    assert!(!b.exists());
}

#[test]
fn undo_restores_deleted_files_with_missing_parents() {
    let dir = tempfile::tempdir().unwrap();
    let deep = dir.path().join("x").join("y").join("c.txt");

    let tracker = tracker();
    tracker.record_edit(
        &deep,
        "apply_patch",
        FileAction::Delete,
        Some("content".to_string()),
        None,
    );

    let report = tracker.undo().unwrap();
    assert!(report.failures.is_empty(), "failures: {:?}", report.failures);
    assert_eq!(std::fs::read_to_string(&deep).unwrap(), "content");
}

#[test]
fn undo_runs_at_most_once() {
    let tracker = tracker();
    tracker.undo().unwrap();
    assert!(matches!(tracker.undo(), Err(TrackerError::AlreadyUndone)));
    assert!(tracker.is_undone());
}

#[test]
fn undo_accumulates_failures_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.txt");
    let tracker = tracker();

    // Update with no recorded old content cannot be restored.
    tracker.record_edit(
        Path::new("/nonexistent/missing.txt"),
        "write_file",
        FileAction::Update,
        None,
        Some("new".to_string()),
    );
    std::fs::write(&good, "v2").unwrap();
    tracker.record_edit(
        &good,
        "write_file",
        FileAction::Update,
        Some("v1".to_string()),
        Some("v2".to_string()),
    );

    let report = tracker.undo().unwrap();
    assert_eq!(report.failures.len(), 1);
    // The good path was still restored.
    assert_eq!(std::fs::read_to_string(&good).unwrap(), "v1");
}

#[test]
fn undo_reverses_renames() {
    let dir = tempfile::tempdir().unwrap();
    let old = dir.path().join("old.txt");
    let new = dir.path().join("new.txt");
    std::fs::write(&new, "moved").unwrap();

    let tracker = tracker();
    tracker.record_rename(&old, &new, "apply_patch");

    let report = tracker.undo().unwrap();
    assert!(report.failures.is_empty());
    assert_eq!(std::fs::read_to_string(&old).unwrap(), "moved");
    assert!(!new.exists());
}

#[test]
fn written_paths_exclude_pure_reads() {
    let tracker = tracker();
    tracker.record_read(Path::new("/work/read-only.txt"), "read_file", None);
    tracker.record_edit(
        Path::new("/work/out.txt"),
        "write_file",
        FileAction::Create,
        None,
        Some("x".to_string()),
    );
    assert_eq!(tracker.written_paths(), vec![PathBuf::from("/work/out.txt")]);
    assert_eq!(tracker.touched_paths().len(), 2);
}

#[test]
fn serial_composition_matches_final_content() {
    // The trail's serialized order replayed over an empty start must land
    // on the last recorded content.
    let tracker = tracker();
    let path = Path::new("/work/seq.txt");
    let mut disk: Option<String> = None;
    for (index, content) in ["one", "two", "three"].iter().enumerate() {
        let action = if index == 0 {
            FileAction::Create
        } else {
            FileAction::Update
        };
        tracker.record_edit(path, "write_file", action, disk.clone(), Some(content.to_string()));
        disk = Some(content.to_string());
    }
    let edits = tracker.edits_for(path);
    let replayed = edits
        .iter()
        .fold(None::<String>, |_, edit| edit.new_content.clone());
    assert_eq!(replayed, disk);
    assert!(tracker.conflicts().is_empty());
}
