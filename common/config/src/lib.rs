//! Configuration file loading for the crucible core.
//!
//! Hosts point the core at a `config.toml`; this crate defines the file
//! format types and the conversions into runtime policy and limit structs.

mod error;
mod toml_config;

pub use error::ConfigError;
pub use error::Result;
pub use toml_config::CompactionConfig;
pub use toml_config::Config;
pub use toml_config::McpSection;
pub use toml_config::McpServerConfig;
pub use toml_config::ModelConfig;
pub use toml_config::ToolLimits;
pub use toml_config::ToolsSection;
