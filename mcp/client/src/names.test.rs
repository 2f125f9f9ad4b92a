use super::*;
use pretty_assertions::assert_eq;

#[test]
fn one_slash_splits_server_and_tool() {
    assert_eq!(parse_mcp_tool_name("docs/search"), Some(("docs", "search")));
}

#[test]
fn zero_or_many_slashes_are_not_mcp() {
    assert_eq!(parse_mcp_tool_name("shell"), None);
    assert_eq!(parse_mcp_tool_name("a/b/c"), None);
}

#[test]
fn empty_segments_are_rejected() {
    assert_eq!(parse_mcp_tool_name("/tool"), None);
    assert_eq!(parse_mcp_tool_name("server/"), None);
    assert_eq!(parse_mcp_tool_name("/"), None);
}

#[test]
fn qualified_name_round_trips() {
    let name = mcp_tool_name("docs", "search");
    assert_eq!(parse_mcp_tool_name(&name), Some(("docs", "search")));
}
