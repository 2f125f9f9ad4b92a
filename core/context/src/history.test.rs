use super::*;
use pretty_assertions::assert_eq;

fn assistant_with_tool_use(id: &str) -> Message {
    Message {
        role: Role::Assistant,
        content: vec![
            ContentBlock::Text {
                text: "running a tool".to_string(),
            },
            ContentBlock::ToolUse {
                id: id.to_string(),
                name: "read_file".to_string(),
                input: serde_json::json!({"file_path": "a.txt"}),
            },
        ],
    }
}

fn result_block(id: &str) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: id.to_string(),
        content: "ok".to_string(),
        is_error: false,
    }
}

#[test]
fn every_tool_use_is_matched_exactly_once() {
    let mut history = ConversationHistory::new();
    history.append(Message::user_text("go")).unwrap();
    history.append(assistant_with_tool_use("call-1")).unwrap();
    assert!(history.has_outstanding_tool_uses());
    assert_eq!(history.outstanding_tool_uses(), vec!["call-1".to_string()]);

    history
        .append_tool_results(vec![result_block("call-1")])
        .unwrap();
    assert!(!history.has_outstanding_tool_uses());
}

#[test]
fn duplicate_in_flight_ids_are_rejected() {
    let mut history = ConversationHistory::new();
    history.append(assistant_with_tool_use("call-1")).unwrap();
    let err = history.append(assistant_with_tool_use("call-1")).unwrap_err();
    assert!(matches!(err, HistoryError::DuplicateToolUse { .. }));
}

#[test]
fn unmatched_results_are_rejected() {
    let mut history = ConversationHistory::new();
    let err = history
        .append_tool_results(vec![result_block("ghost")])
        .unwrap_err();
    assert!(matches!(err, HistoryError::UnmatchedToolResult { .. }));
}

#[test]
fn double_answering_a_call_is_rejected() {
    let mut history = ConversationHistory::new();
    history.append(assistant_with_tool_use("call-1")).unwrap();
    history
        .append_tool_results(vec![result_block("call-1")])
        .unwrap();
    let err = history
        .append_tool_results(vec![result_block("call-1")])
        .unwrap_err();
    assert!(matches!(err, HistoryError::UnmatchedToolResult { .. }));
}

#[test]
fn system_must_come_first() {
    let mut history = ConversationHistory::new();
    history.append(Message::system_text("be helpful")).unwrap();
    history.append(Message::user_text("hi")).unwrap();
    let err = history.append(Message::system_text("late")).unwrap_err();
    assert!(matches!(err, HistoryError::SystemNotFirst));
}

#[test]
fn token_totals_track_appends() {
    let mut history = ConversationHistory::new();
    assert_eq!(history.total_tokens(), 0);
    history
        .append(Message::user_text("x".repeat(400)))
        .unwrap();
    assert_eq!(history.total_tokens(), 100);
}

#[test]
fn snapshot_preserves_wire_order() {
    let mut history = ConversationHistory::new();
    history.append(Message::system_text("sys")).unwrap();
    history.append(Message::user_text("first")).unwrap();
    history.append(assistant_with_tool_use("call-1")).unwrap();
    history
        .append_tool_results(vec![result_block("call-1")])
        .unwrap();

    let snapshot = history.snapshot_for_model();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot[0].role, Role::System);
    assert_eq!(snapshot[1].text(), "first");
    assert_eq!(snapshot[3].tool_result_ids(), vec!["call-1"]);
}

#[test]
fn legacy_call_blocks_count_as_outstanding() {
    let mut history = ConversationHistory::new();
    let message = Message {
        role: Role::Assistant,
        content: vec![ContentBlock::CustomToolCall {
            id: "call-9".to_string(),
            name: "apply_patch".to_string(),
            input: "*** Begin Patch".to_string(),
        }],
    };
    history.append(message).unwrap();
    assert_eq!(history.outstanding_tool_uses(), vec!["call-9".to_string()]);
}
