use super::*;
use crucible_protocol::ContentBlock;
use crucible_protocol::Role;
use pretty_assertions::assert_eq;

#[test]
fn estimate_rounds_up() {
    let meter = TokenMeter::default();
    assert_eq!(meter.estimate(""), 0);
    assert_eq!(meter.estimate("abc"), 1);
    assert_eq!(meter.estimate("abcd"), 1);
    assert_eq!(meter.estimate("abcde"), 2);
}

#[test]
fn message_tokens_cover_tool_blocks() {
    let meter = TokenMeter::default();
    let message = Message {
        role: Role::User,
        content: vec![ContentBlock::ToolResult {
            tool_use_id: "call".to_string(),
            content: "x".repeat(40),
            is_error: false,
        }],
    };
    // 4 id bytes + 40 content bytes.
    assert_eq!(meter.message_tokens(&message), 11);
}

#[test]
fn custom_ratio_is_respected() {
    let meter = TokenMeter::new(2);
    assert_eq!(meter.estimate("abcd"), 2);
    // A zero ratio clamps to one byte per token.
    let meter = TokenMeter::new(0);
    assert_eq!(meter.estimate("abcd"), 4);
}
