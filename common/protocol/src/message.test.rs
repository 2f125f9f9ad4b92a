use super::*;
use pretty_assertions::assert_eq;

#[test]
fn text_joins_only_text_blocks() {
    let message = Message {
        role: Role::Assistant,
        content: vec![
            ContentBlock::Text {
                text: "first".to_string(),
            },
            ContentBlock::ToolUse {
                id: "call-1".to_string(),
                name: "shell".to_string(),
                input: serde_json::json!({}),
            },
            ContentBlock::Text {
                text: "second".to_string(),
            },
        ],
    };
    assert_eq!(message.text(), "first\nsecond");
}

#[test]
fn tool_use_ids_preserve_block_order() {
    let message = Message {
        role: Role::Assistant,
        content: vec![
            ContentBlock::ToolUse {
                id: "call-b".to_string(),
                name: "read_file".to_string(),
                input: serde_json::json!({}),
            },
            ContentBlock::ToolUse {
                id: "call-a".to_string(),
                name: "read_file".to_string(),
                input: serde_json::json!({}),
            },
        ],
    };
    assert_eq!(message.tool_use_ids(), vec!["call-b", "call-a"]);
}

#[test]
fn tool_result_ids_match_result_blocks() {
    let message = Message::tool_results(vec![ContentBlock::ToolResult {
        tool_use_id: "call-1".to_string(),
        content: "ok".to_string(),
        is_error: false,
    }]);
    assert_eq!(message.role, Role::User);
    assert_eq!(message.tool_result_ids(), vec!["call-1"]);
}

#[test]
fn content_block_wire_tags() {
    let block = ContentBlock::ToolResult {
        tool_use_id: "call-1".to_string(),
        content: "done".to_string(),
        is_error: true,
    };
    let json = serde_json::to_value(&block).unwrap();
    assert_eq!(json["type"], "tool_result");
    assert_eq!(json["tool_use_id"], "call-1");
    assert_eq!(json["is_error"], true);
}

#[test]
fn byte_len_counts_all_block_kinds() {
    let message = Message {
        role: Role::User,
        content: vec![
            ContentBlock::Text {
                text: "abcd".to_string(),
            },
            ContentBlock::ToolResult {
                tool_use_id: "id".to_string(),
                content: "xy".to_string(),
                is_error: false,
            },
        ],
    };
    assert_eq!(message.byte_len(), 4 + 2 + 2);
}
