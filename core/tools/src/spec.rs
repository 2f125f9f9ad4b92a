//! Spec registration and the builtin tool surface.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crucible_protocol::McpToolInfo;
use crucible_protocol::ParamSchema;
use crucible_protocol::SchemaError;
use crucible_protocol::ToolSpec;
use crucible_protocol::sanitize_schema;
use tracing::warn;

use crucible_mcp::mcp_tool_name;

/// The immutable table of tool specs for a session.
///
/// Built once before the first turn; duplicate registrations warn and the
/// last one wins.
#[derive(Debug, Default)]
pub struct SpecRegistry {
    specs: Vec<ToolSpec>,
    by_name: HashMap<String, usize>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec. The schema must already be fully realized; specs
    /// built through [`ToolSpec::new`] with [`ParamSchema`] values are.
    pub fn register(&mut self, spec: ToolSpec) {
        if let Some(&index) = self.by_name.get(&spec.name) {
            warn!(tool = %spec.name, "duplicate tool spec registration; last wins");
            self.specs[index] = spec;
            return;
        }
        self.by_name.insert(spec.name.clone(), self.specs.len());
        self.specs.push(spec);
    }

    /// Register the tools an MCP server advertises, namespaced as
    /// `server/tool`. Schemas are sanitized before the model sees them.
    pub fn register_mcp_tools(
        &mut self,
        server: &str,
        tools: &[McpToolInfo],
    ) -> Result<(), SchemaError> {
        for tool in tools {
            let parameters = sanitize_schema(&tool.input_schema)?;
            self.register(ToolSpec::new(
                mcp_tool_name(server, &tool.name),
                tool.description.clone().unwrap_or_default(),
                parameters,
                // MCP servers give no parallelism contract; be conservative.
                false,
            ));
        }
        Ok(())
    }

    /// Whether calls to `name` may share the turn's read guard. Unknown
    /// names are non-parallel.
    pub fn supports_parallel(&self, name: &str) -> bool {
        self.by_name
            .get(name)
            .map(|&index| self.specs[index].supports_parallel)
            .unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// The specs shown to the model, in registration order.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// A registry pre-loaded with the builtin tool surface.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(shell_spec());
        registry.register(read_file_spec());
        registry.register(write_file_spec());
        registry.register(apply_patch_spec());
        registry
    }
}

fn string_prop(description: &str) -> ParamSchema {
    ParamSchema::String {
        description: Some(description.to_string()),
    }
}

fn number_prop(description: &str) -> ParamSchema {
    ParamSchema::Number {
        description: Some(description.to_string()),
    }
}

fn boolean_prop(description: &str) -> ParamSchema {
    ParamSchema::Boolean {
        description: Some(description.to_string()),
    }
}

fn object(
    properties: impl IntoIterator<Item = (&'static str, ParamSchema)>,
    required: &[&str],
) -> ParamSchema {
    ParamSchema::Object {
        properties: properties
            .into_iter()
            .map(|(name, schema)| (name.to_string(), schema))
            .collect::<BTreeMap<_, _>>(),
        required: required.iter().map(|name| name.to_string()).collect(),
        additional_properties: false,
        description: None,
    }
}

/// Spec for the `shell` tool.
pub fn shell_spec() -> ToolSpec {
    ToolSpec::new(
        "shell",
        "Runs a shell command and returns its output.",
        object(
            [
                (
                    "command",
                    ParamSchema::Array {
                        items: Box::new(string_prop("argv element")),
                        description: Some("The command to execute as an argv array".to_string()),
                    },
                ),
                ("workdir", string_prop("Working directory for the command")),
                (
                    "timeout_ms",
                    number_prop("Maximum runtime in milliseconds before the command is killed"),
                ),
                (
                    "with_escalated_permissions",
                    boolean_prop("Request to run outside the sandbox; requires approval"),
                ),
                (
                    "justification",
                    string_prop("Why escalated permissions are needed"),
                ),
                (
                    "is_background",
                    boolean_prop("Run in the background and return a task descriptor"),
                ),
            ],
            &["command"],
        ),
        false,
    )
}

/// Spec for the `read_file` tool.
pub fn read_file_spec() -> ToolSpec {
    ToolSpec::new(
        "read_file",
        "Reads a file from the local filesystem.",
        object(
            [
                ("file_path", string_prop("Absolute or cwd-relative path")),
                ("offset", number_prop("1-indexed first line to read")),
                ("limit", number_prop("Maximum number of lines to read")),
            ],
            &["file_path"],
        ),
        true,
    )
}

/// Spec for the `write_file` tool.
pub fn write_file_spec() -> ToolSpec {
    ToolSpec::new(
        "write_file",
        "Writes a file, creating it if missing and overwriting otherwise.",
        object(
            [
                ("file_path", string_prop("Absolute or cwd-relative path")),
                ("content", string_prop("The complete new file content")),
            ],
            &["file_path", "content"],
        ),
        false,
    )
}

/// Spec for the `apply_patch` tool.
pub fn apply_patch_spec() -> ToolSpec {
    ToolSpec::new(
        "apply_patch",
        "Applies a patch envelope that adds, updates, deletes, or moves files.",
        object(
            [(
                "input",
                string_prop("The patch, wrapped in *** Begin Patch / *** End Patch markers"),
            )],
            &["input"],
        ),
        false,
    )
}

#[cfg(test)]
#[path = "spec.test.rs"]
mod tests;
