use super::*;
use pretty_assertions::assert_eq;

#[test]
fn resolve_path_handles_absolute_and_relative() {
    let turn = TurnContextBuilder::new("turn-1", "/home/user/project").build();
    assert_eq!(
        turn.resolve_path("src/main.rs"),
        PathBuf::from("/home/user/project/src/main.rs")
    );
    assert_eq!(turn.resolve_path("/etc/hosts"), PathBuf::from("/etc/hosts"));
}

#[test]
fn builder_defaults_are_sane() {
    let turn = TurnContextBuilder::new("turn-1", "/work").build();
    assert_eq!(turn.turn_id, "turn-1");
    assert!(turn.approval.is_none());
    assert!(!turn.is_cancelled());
    assert!(turn.mcp.server_names().is_empty());
}

#[test]
fn cancellation_propagates_from_the_token() {
    let token = CancellationToken::new();
    let turn = TurnContextBuilder::new("turn-1", "/work")
        .cancel_token(token.clone())
        .build();
    assert!(!turn.is_cancelled());
    token.cancel();
    assert!(turn.is_cancelled());
}
