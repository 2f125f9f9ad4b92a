use super::*;
use crate::mcp::CallToolResult;
use crate::mcp::McpContent;
use crate::message::ContentBlock;
use pretty_assertions::assert_eq;

#[test]
fn function_output_converts_to_result_block() {
    let output = ToolOutput::text("hello");
    let block = output.into_result_block("call-1");
    assert_eq!(
        block,
        ContentBlock::ToolResult {
            tool_use_id: "call-1".to_string(),
            content: "hello".to_string(),
            is_error: false,
        }
    );
}

#[test]
fn error_output_sets_is_error() {
    let block = ToolOutput::error("boom").into_result_block("call-2");
    match block {
        ContentBlock::ToolResult { is_error, .. } => assert!(is_error),
        other => panic!("unexpected block: {other:?}"),
    }
}

#[test]
fn mcp_output_flattens_text_content() {
    let output = ToolOutput::Mcp {
        result: CallToolResult {
            content: vec![
                McpContent::Text {
                    text: "a".to_string(),
                },
                McpContent::Text {
                    text: "b".to_string(),
                },
            ],
            is_error: false,
        },
    };
    assert_eq!(output.content_text(), "a\nb");
    assert!(output.success());
}

#[test]
fn exec_metadata_rounds_duration_to_one_decimal() {
    let metadata = ExecMetadata::new(
        0,
        std::time::Duration::from_millis(1_234),
        false,
        false,
    );
    assert_eq!(metadata.duration_seconds, 1.2);

    let metadata = ExecMetadata::new(1, std::time::Duration::from_millis(56), true, true);
    assert_eq!(metadata.duration_seconds, 0.1);
}

#[test]
fn exec_envelope_wire_shape() {
    let envelope = ExecEnvelope {
        output: "done\n".to_string(),
        metadata: ExecMetadata {
            exit_code: 0,
            duration_seconds: 0.3,
            timed_out: false,
            truncated: true,
        },
    };
    let json = envelope.to_json();
    assert_eq!(json["output"], "done\n");
    assert_eq!(json["metadata"]["exit_code"], 0);
    assert_eq!(json["metadata"]["truncated"], true);
    assert_eq!(json["metadata"]["timed_out"], false);
}

#[test]
fn payload_tags_are_stable() {
    let payload = ToolPayload::Mcp {
        server: "docs".to_string(),
        tool: "search".to_string(),
        raw_arguments: "{}".to_string(),
    };
    assert_eq!(payload.tag(), "mcp");
    assert_eq!(payload.input_bytes(), 2);
}
