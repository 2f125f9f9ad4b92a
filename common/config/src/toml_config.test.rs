use super::*;
use crucible_policy::ApprovalPolicy;
use crucible_policy::SandboxMode;
use pretty_assertions::assert_eq;

#[test]
fn empty_input_yields_defaults() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config, Config::default());
    assert!(config.compaction.auto);
    assert_eq!(config.compaction.keep_last_turns, 4);
    assert_eq!(config.tools.limits.max_stdout_bytes, 10 * 1024);
    assert_eq!(config.tools.limits.max_lines, 256);
}

#[test]
fn full_file_round_trips() {
    let text = r#"
[model]
name = "big-model"
context_tokens = 150000

[compaction]
auto = false
keep_last_turns = 2
target_tokens = 60000

[execution]
sandbox = "strict"
approval = "on_write"
allowed_paths = ["/work"]
blocked_commands = ["sudo"]
timeout_seconds = 30.0

[tools.limits]
max_tool_tokens = 1000
max_stdout_bytes = 4096
max_lines = 100
max_in_flight = 4

[[mcp.definitions]]
name = "docs"
command = "mcp-docs"
args = ["--stdio"]
ttl_seconds = 600

[mcp.definitions.env]
DOCS_ROOT = "/srv/docs"
"#;
    let config = Config::from_toml_str(text).unwrap();
    assert_eq!(config.model.name, "big-model");
    assert_eq!(config.model.context_tokens, 150_000);
    assert!(!config.compaction.auto);
    assert_eq!(config.compaction.target_tokens, 60_000);
    assert_eq!(config.execution.sandbox, SandboxMode::Strict);
    assert_eq!(config.execution.approval, ApprovalPolicy::OnWrite);
    assert_eq!(config.execution.timeout_seconds, Some(30.0));
    assert_eq!(config.tools.limits.max_in_flight, Some(4));
    assert_eq!(config.mcp.definitions.len(), 1);
    let server = &config.mcp.definitions[0];
    assert_eq!(server.name, "docs");
    assert_eq!(server.ttl_seconds, Some(600));
    assert_eq!(server.env["DOCS_ROOT"], "/srv/docs");
}

#[test]
fn unknown_keys_are_ignored() {
    let config = Config::from_toml_str("[model]\nname = \"m\"\nfuture_knob = 1\n").unwrap();
    assert_eq!(config.model.name, "m");
}

#[test]
fn malformed_toml_is_an_error() {
    assert!(Config::from_toml_str("[model\nname = ").is_err());
}

#[test]
fn missing_file_loads_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn file_on_disk_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[compaction]\ntarget_tokens = 5000\n").unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.compaction.target_tokens, 5_000);
}
