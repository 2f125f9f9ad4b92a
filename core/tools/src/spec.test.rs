use super::*;
use pretty_assertions::assert_eq;

#[test]
fn builtins_cover_the_archetypes() {
    let registry = SpecRegistry::with_builtins();
    for name in ["shell", "read_file", "write_file", "apply_patch"] {
        assert!(registry.contains(name), "missing spec for {name}");
    }
}

#[test]
fn only_read_file_is_parallel_safe_by_default() {
    let registry = SpecRegistry::with_builtins();
    assert!(registry.supports_parallel("read_file"));
    assert!(!registry.supports_parallel("shell"));
    assert!(!registry.supports_parallel("write_file"));
    assert!(!registry.supports_parallel("apply_patch"));
}

#[test]
fn unknown_names_default_to_non_parallel() {
    let registry = SpecRegistry::with_builtins();
    assert!(!registry.supports_parallel("no_such_tool"));
}

#[test]
fn duplicate_registration_keeps_the_last_spec() {
    let mut registry = SpecRegistry::new();
    registry.register(read_file_spec());
    let replacement = ToolSpec::new(
        "read_file",
        "replacement",
        ParamSchema::empty_object(),
        false,
    );
    registry.register(replacement);
    assert_eq!(registry.specs().len(), 1);
    assert_eq!(registry.specs()[0].description, "replacement");
    assert!(!registry.supports_parallel("read_file"));
}

#[test]
fn mcp_tools_register_namespaced_and_sanitized() {
    let mut registry = SpecRegistry::new();
    let tools = vec![McpToolInfo {
        name: "search".to_string(),
        description: Some("Search the docs".to_string()),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {"limit": {"type": "integer"}},
        }),
    }];
    registry.register_mcp_tools("docs", &tools).unwrap();
    assert!(registry.contains("docs/search"));
    assert!(!registry.supports_parallel("docs/search"));
    match &registry.specs()[0].parameters {
        ParamSchema::Object { properties, .. } => {
            assert_eq!(
                properties["limit"],
                ParamSchema::Number { description: None }
            );
        }
        other => panic!("expected object schema, got {other:?}"),
    }
}

#[test]
fn shell_spec_declares_required_command() {
    let spec = shell_spec();
    match &spec.parameters {
        ParamSchema::Object { required, .. } => {
            assert_eq!(required, &vec!["command".to_string()]);
        }
        other => panic!("expected object schema, got {other:?}"),
    }
    assert!(!spec.supports_parallel);
}
