use super::*;
use crate::error::ToolError;
use pretty_assertions::assert_eq;
use std::path::Path;

#[test]
fn parses_add_update_delete() {
    let text = "*** Begin Patch\n\
        *** Add File: new.txt\n\
        +hello\n\
        +world\n\
        *** Update File: src/lib.rs\n\
        @@ fn main\n\
        -    old();\n\
        +    new();\n\
        *** Delete File: gone.txt\n\
        *** End Patch";
    let ops = parse_patch(text).unwrap();
    assert_eq!(ops.len(), 3);

    match &ops[0] {
        PatchOp::Add { path, content } => {
            assert_eq!(path, &PathBuf::from("new.txt"));
            assert_eq!(content, "hello\nworld\n");
        }
        other => panic!("expected add, got {other:?}"),
    }
    match &ops[1] {
        PatchOp::Update {
            path,
            move_to,
            chunks,
        } => {
            assert_eq!(path, &PathBuf::from("src/lib.rs"));
            assert!(move_to.is_none());
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].context.as_deref(), Some("fn main"));
            assert_eq!(chunks[0].old_lines, vec!["    old();"]);
            assert_eq!(chunks[0].new_lines, vec!["    new();"]);
        }
        other => panic!("expected update, got {other:?}"),
    }
    match &ops[2] {
        PatchOp::Delete { path } => assert_eq!(path, &PathBuf::from("gone.txt")),
        other => panic!("expected delete, got {other:?}"),
    }
}

#[test]
fn parses_move_to() {
    let text = "*** Begin Patch\n\
        *** Update File: old_name.rs\n\
        *** Move to: new_name.rs\n\
        @@\n\
        -a\n\
        +b\n\
        *** End Patch";
    let ops = parse_patch(text).unwrap();
    match &ops[0] {
        PatchOp::Update { move_to, .. } => {
            assert_eq!(move_to.as_deref(), Some(Path::new("new_name.rs")));
        }
        other => panic!("expected update, got {other:?}"),
    }
}

#[test]
fn missing_markers_are_validation_errors() {
    assert!(matches!(
        parse_patch("*** Update File: a.rs\n").unwrap_err(),
        ToolError::Validation { .. }
    ));
    assert!(matches!(
        parse_patch("*** Begin Patch\n*** Delete File: a.rs\n").unwrap_err(),
        ToolError::Validation { .. }
    ));
    assert!(matches!(
        parse_patch("*** Begin Patch\n*** End Patch").unwrap_err(),
        ToolError::Validation { .. }
    ));
}

#[test]
fn update_without_changes_is_rejected() {
    let text = "*** Begin Patch\n*** Update File: a.rs\n*** End Patch";
    assert!(matches!(
        parse_patch(text).unwrap_err(),
        ToolError::Validation { .. }
    ));
}

#[test]
fn apply_replaces_matching_block() {
    let content = "fn main() {\n    old();\n}\n";
    let chunks = vec![Chunk {
        context: None,
        old_lines: vec!["    old();".to_string()],
        new_lines: vec!["    new();".to_string()],
        at_end_of_file: false,
    }];
    let updated = apply_chunks(Path::new("a.rs"), content, &chunks).unwrap();
    assert_eq!(updated, "fn main() {\n    new();\n}\n");
}

#[test]
fn context_narrows_the_match() {
    let content = "fn alpha() {\n    call();\n}\nfn beta() {\n    call();\n}\n";
    let chunks = vec![Chunk {
        context: Some("fn beta() {".to_string()),
        old_lines: vec!["    call();".to_string()],
        new_lines: vec!["    other();".to_string()],
        at_end_of_file: false,
    }];
    let updated = apply_chunks(Path::new("a.rs"), content, &chunks).unwrap();
    assert_eq!(
        updated,
        "fn alpha() {\n    call();\n}\nfn beta() {\n    other();\n}\n"
    );
}

#[test]
fn missing_pre_image_is_a_conflict() {
    let content = "completely different\n";
    let chunks = vec![Chunk {
        context: None,
        old_lines: vec!["    old();".to_string()],
        new_lines: vec!["    new();".to_string()],
        at_end_of_file: false,
    }];
    let err = apply_chunks(Path::new("a.rs"), content, &chunks).unwrap_err();
    assert!(matches!(err, ToolError::Conflict { .. }));
}

#[test]
fn missing_context_is_a_conflict() {
    let content = "line\n";
    let chunks = vec![Chunk {
        context: Some("fn nowhere()".to_string()),
        old_lines: vec!["line".to_string()],
        new_lines: vec!["other".to_string()],
        at_end_of_file: false,
    }];
    let err = apply_chunks(Path::new("a.rs"), content, &chunks).unwrap_err();
    assert!(matches!(err, ToolError::Conflict { .. }));
}

#[test]
fn pure_insertion_after_context() {
    let content = "fn main() {\n}\n";
    let chunks = vec![Chunk {
        context: Some("fn main() {".to_string()),
        old_lines: vec![],
        new_lines: vec!["    setup();".to_string()],
        at_end_of_file: false,
    }];
    let updated = apply_chunks(Path::new("a.rs"), content, &chunks).unwrap();
    assert_eq!(updated, "fn main() {\n    setup();\n}\n");
}

#[test]
fn end_of_file_anchor_must_match_the_tail() {
    let content = "first\nlast\n";
    let chunks = vec![Chunk {
        context: None,
        old_lines: vec!["first".to_string()],
        new_lines: vec!["changed".to_string()],
        at_end_of_file: true,
    }];
    let err = apply_chunks(Path::new("a.rs"), content, &chunks).unwrap_err();
    assert!(matches!(err, ToolError::Conflict { .. }));
}

#[test]
fn sequential_chunks_apply_in_order() {
    let content = "a\nb\nc\nd\n";
    let chunks = vec![
        Chunk {
            context: None,
            old_lines: vec!["a".to_string()],
            new_lines: vec!["A".to_string()],
            at_end_of_file: false,
        },
        Chunk {
            context: None,
            old_lines: vec!["c".to_string()],
            new_lines: vec!["C".to_string()],
            at_end_of_file: false,
        },
    ];
    let updated = apply_chunks(Path::new("a.rs"), content, &chunks).unwrap();
    assert_eq!(updated, "A\nb\nC\nd\n");
}
