use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn integer_normalizes_to_number() {
    let schema = sanitize_schema(&json!({"type": "integer", "description": "count"})).unwrap();
    assert_eq!(
        schema,
        ParamSchema::Number {
            description: Some("count".to_string())
        }
    );
}

#[test]
fn object_without_properties_gets_empty_properties() {
    let schema = sanitize_schema(&json!({"type": "object"})).unwrap();
    match schema {
        ParamSchema::Object {
            properties,
            required,
            additional_properties,
            ..
        } => {
            assert!(properties.is_empty());
            assert!(required.is_empty());
            assert!(!additional_properties);
        }
        other => panic!("expected object, got {other:?}"),
    }
}

#[test]
fn array_without_items_gets_string_items() {
    let schema = sanitize_schema(&json!({"type": "array"})).unwrap();
    match schema {
        ParamSchema::Array { items, .. } => {
            assert_eq!(*items, ParamSchema::String { description: None });
        }
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn missing_type_with_properties_infers_object() {
    let schema = sanitize_schema(&json!({
        "properties": {"path": {"type": "string"}},
        "required": ["path"],
    }))
    .unwrap();
    match schema {
        ParamSchema::Object {
            properties,
            required,
            ..
        } => {
            assert!(properties.contains_key("path"));
            assert_eq!(required, vec!["path".to_string()]);
        }
        other => panic!("expected object, got {other:?}"),
    }
}

#[test]
fn ref_nodes_become_recursive_stubs() {
    let schema = sanitize_schema(&json!({
        "type": "object",
        "properties": {
            "node": {"$ref": "#/definitions/node"},
        },
    }))
    .unwrap();
    match schema {
        ParamSchema::Object { properties, .. } => {
            assert_eq!(
                properties["node"],
                ParamSchema::String {
                    description: Some("recursive reference".to_string())
                }
            );
        }
        other => panic!("expected object, got {other:?}"),
    }
}

#[test]
fn unbounded_nesting_is_rejected() {
    let mut value = json!({"type": "string"});
    for _ in 0..40 {
        value = json!({"type": "array", "items": value});
    }
    assert!(sanitize_schema(&value).is_err());
}

#[test]
fn serialized_object_uses_additional_properties_key() {
    let schema = ParamSchema::Object {
        properties: [(
            "count".to_string(),
            ParamSchema::Number { description: None },
        )]
        .into_iter()
        .collect(),
        required: vec!["count".to_string()],
        additional_properties: true,
        description: None,
    };
    let json = serde_json::to_value(&schema).unwrap();
    assert_eq!(json["type"], "object");
    assert_eq!(json["additionalProperties"], true);
    assert_eq!(json["properties"]["count"]["type"], "number");
}
