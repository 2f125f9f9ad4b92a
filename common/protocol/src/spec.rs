//! Tool specs and parameter-schema sanitization.
//!
//! The model's API rejects under-specified schemas, so every spec shown to
//! the model is first normalized into the fully-realized [`ParamSchema`]
//! subset: objects always carry `properties`, arrays always carry `items`,
//! and `integer` collapses into `number`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use snafu::Snafu;

/// Maximum nesting depth accepted while sanitizing a foreign schema.
/// Anything deeper is treated as unbounded recursion and rejected.
const MAX_SCHEMA_DEPTH: usize = 32;

/// Stub inserted where a recursive reference was detected.
fn recursive_stub() -> ParamSchema {
    ParamSchema::String {
        description: Some("recursive reference".to_string()),
    }
}

/// Errors produced while sanitizing a schema.
#[derive(Debug, Snafu)]
pub enum SchemaError {
    /// The schema nests deeper than [`MAX_SCHEMA_DEPTH`].
    #[snafu(display("schema exceeds maximum depth of {MAX_SCHEMA_DEPTH}"))]
    TooDeep,
}

/// Fully-realized JSON-schema subset shown to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamSchema {
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Array {
        items: Box<ParamSchema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Object {
        properties: BTreeMap<String, ParamSchema>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        required: Vec<String>,
        #[serde(
            rename = "additionalProperties",
            default,
            skip_serializing_if = "std::ops::Not::not"
        )]
        additional_properties: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl ParamSchema {
    /// An object schema with no parameters.
    pub fn empty_object() -> Self {
        ParamSchema::Object {
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: false,
            description: None,
        }
    }
}

/// A tool as declared to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: ParamSchema,
    /// Whether calls to this tool may run concurrently with other
    /// parallel-safe calls in the same turn.
    pub supports_parallel: bool,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParamSchema,
        supports_parallel: bool,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            supports_parallel,
        }
    }
}

/// Normalize a foreign JSON schema (for example one reported by an MCP
/// server) into the realized subset.
///
/// `$ref` nodes are replaced with a string stub: within a single schema
/// document they are the only way a cycle can be expressed, and following
/// them across documents is out of scope. Nesting past the hard depth cap
/// is an error rather than a stub, so malformed schemas fail loudly.
pub fn sanitize_schema(value: &Value) -> Result<ParamSchema, SchemaError> {
    sanitize_at(value, 0)
}

fn sanitize_at(value: &Value, depth: usize) -> Result<ParamSchema, SchemaError> {
    if depth > MAX_SCHEMA_DEPTH {
        return Err(SchemaError::TooDeep);
    }

    let object = match value.as_object() {
        Some(object) => object,
        // Non-object schema nodes carry no usable constraint.
        None => return Ok(ParamSchema::empty_object()),
    };

    if object.contains_key("$ref") {
        return Ok(recursive_stub());
    }

    let description = object
        .get("description")
        .and_then(Value::as_str)
        .map(String::from);

    let declared = object.get("type").and_then(Value::as_str);
    let kind = match declared {
        Some(kind) => kind,
        // No declared type: infer object when properties exist, else accept
        // anything as a string.
        None if object.contains_key("properties") => "object",
        None => "string",
    };

    let schema = match kind {
        "boolean" => ParamSchema::Boolean { description },
        // The wire format only knows `number`.
        "number" | "integer" => ParamSchema::Number { description },
        "array" => {
            let items = match object.get("items") {
                Some(items) => sanitize_at(items, depth + 1)?,
                None => ParamSchema::String { description: None },
            };
            ParamSchema::Array {
                items: Box::new(items),
                description,
            }
        }
        "object" => {
            let mut properties = BTreeMap::new();
            if let Some(raw) = object.get("properties").and_then(Value::as_object) {
                for (key, child) in raw {
                    properties.insert(key.clone(), sanitize_at(child, depth + 1)?);
                }
            }
            let required = object
                .get("required")
                .and_then(Value::as_array)
                .map(|names| {
                    names
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            let additional_properties = object
                .get("additionalProperties")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            ParamSchema::Object {
                properties,
                required,
                additional_properties,
                description,
            }
        }
        // Unknown types (null, string, anything else) degrade to string.
        _ => ParamSchema::String { description },
    };

    Ok(schema)
}

#[cfg(test)]
#[path = "spec.test.rs"]
mod tests;
