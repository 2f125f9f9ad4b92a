//! Namespaced tool-name handling.

/// Split a fully-qualified tool name into `(server, tool)`.
///
/// MCP tools are detected by the presence of exactly one `/`; names with
/// zero or multiple slashes are plain function tools.
pub fn parse_mcp_tool_name(name: &str) -> Option<(&str, &str)> {
    let mut parts = name.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(server), Some(tool), None) if !server.is_empty() && !tool.is_empty() => {
            Some((server, tool))
        }
        _ => None,
    }
}

/// The fully-qualified name a server's tool is registered under.
pub fn mcp_tool_name(server: &str, tool: &str) -> String {
    format!("{server}/{tool}")
}

#[cfg(test)]
#[path = "names.test.rs"]
mod tests;
