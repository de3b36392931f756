use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the SMB log parser.
///
/// Only the I/O edges (readers, sources, sinks, config loading) produce
/// these. Interpreting log text never fails.
#[derive(Error, Debug)]
pub enum SmbLogError {
    /// A log file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file exists but could not be read.
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`AppConfig`](crate::settings::AppConfig).
    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A saved log-query response could not be decoded.
    #[error("Failed to parse query result: {0}")]
    QueryResultParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A metrics sink rejected a publish.
    #[error("Metrics sink error: {0}")]
    Sink(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the smblog crates.
pub type Result<T> = std::result::Result<T, SmbLogError>;
