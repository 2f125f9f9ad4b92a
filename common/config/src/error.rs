//! Configuration errors.

use std::path::PathBuf;

use snafu::Snafu;

/// Errors loading or parsing a configuration file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module)]
pub enum ConfigError {
    #[snafu(display("failed to read config file {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse config file: {source}"))]
    ParseToml { source: toml::de::Error },
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
