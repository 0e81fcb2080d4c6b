//! Error types for the formgrid binary

use formgrid_core::CoreError;
use formgrid_schema::SchemaError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid command-line argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A file could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON input
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema loading error
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Form or table error
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CliError {
    /// Stable error code, delegating to the wrapped schema or core error
    pub fn error_code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "ERR_CLI_CONFIG",
            CliError::InvalidArgument(_) => "ERR_CLI_INVALID_ARGUMENT",
            CliError::Io { .. } => "ERR_CLI_IO",
            CliError::Json(_) => "ERR_CLI_JSON_PARSE",
            CliError::Schema(err) => err.error_code(),
            CliError::Core(err) => err.error_code(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
