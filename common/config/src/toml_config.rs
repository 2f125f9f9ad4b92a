//! File format types for `config.toml`.
//!
//! # Example
//!
//! ```toml
//! [model]
//! name = "default-model"
//! context_tokens = 200000
//!
//! [compaction]
//! auto = true
//! keep_last_turns = 4
//! target_tokens = 120000
//!
//! [execution]
//! sandbox = "restricted"
//! approval = "on_write"
//! blocked_commands = ["rm -rf"]
//!
//! [tools.limits]
//! max_stdout_bytes = 10240
//! max_lines = 256
//!
//! [[mcp.definitions]]
//! name = "docs"
//! command = "mcp-docs"
//! args = ["--stdio"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use crucible_policy::ExecutionPolicy;
use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;

use crate::error::Result;
use crate::error::config_error;

/// The whole configuration file. Unknown keys are ignored; a missing file
/// yields the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub compaction: CompactionConfig,

    #[serde(default)]
    pub execution: ExecutionPolicy,

    #[serde(default)]
    pub tools: ToolsSection,

    #[serde(default)]
    pub mcp: McpSection,
}

impl Config {
    /// Load from a file path. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).context(config_error::ReadFileSnafu { path })?;
        Self::from_toml_str(&text)
    }

    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context(config_error::ParseTomlSnafu)
    }
}

/// `[model]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_context_tokens")]
    pub context_tokens: i64,
}

fn default_model_name() -> String {
    "default".to_string()
}

fn default_context_tokens() -> i64 {
    200_000
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            context_tokens: default_context_tokens(),
        }
    }
}

/// `[compaction]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_true")]
    pub auto: bool,
    #[serde(default = "default_keep_last_turns")]
    pub keep_last_turns: i32,
    #[serde(default = "default_target_tokens")]
    pub target_tokens: i64,
}

fn default_true() -> bool {
    true
}

fn default_keep_last_turns() -> i32 {
    4
}

fn default_target_tokens() -> i64 {
    100_000
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            auto: true,
            keep_last_turns: default_keep_last_turns(),
            target_tokens: default_target_tokens(),
        }
    }
}

/// `[tools]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsSection {
    #[serde(default)]
    pub limits: ToolLimits,
}

/// `[tools.limits]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolLimits {
    /// Token ceiling for a single tool result delivered to the model.
    #[serde(default = "default_max_tool_tokens")]
    pub max_tool_tokens: i64,
    /// Byte ceiling for captured stdout/stderr.
    #[serde(default = "default_max_stdout_bytes")]
    pub max_stdout_bytes: usize,
    /// Line ceiling for a single tool result.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Optional throttle on concurrently running tool calls per turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,
}

fn default_max_tool_tokens() -> i64 {
    2_560
}

fn default_max_stdout_bytes() -> usize {
    10 * 1024
}

fn default_max_lines() -> usize {
    256
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            max_tool_tokens: default_max_tool_tokens(),
            max_stdout_bytes: default_max_stdout_bytes(),
            max_lines: default_max_lines(),
            max_in_flight: None,
        }
    }
}

/// `[mcp]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpSection {
    #[serde(default)]
    pub definitions: Vec<McpServerConfig>,
}

/// One `[[mcp.definitions]]` entry: how to launch an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

#[cfg(test)]
#[path = "toml_config.test.rs"]
mod tests;
