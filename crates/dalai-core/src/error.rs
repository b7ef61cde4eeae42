//! Error types for the dalai installer.
//!
//! Every failure in the pipeline is fatal to the current batch. The variants
//! exist so callers (and the CLI) can tell a bad request apart from a broken
//! toolchain or a failed transfer when reporting.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the dalai core library.
#[derive(Debug, Error)]
pub enum DalaiError {
    // Request validation
    #[error("The model name must be one of: 7B, 13B, 30B, and 65B (got '{name}')")]
    InvalidModel { name: String },

    // Subprocess errors
    #[error("running '{command}' failed (exit code {code:?})")]
    ProcessFailed { command: String, code: Option<i32> },

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' did not finish within {after:?}")]
    Timeout { command: String, after: Duration },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // Network errors
    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    // Serialization errors
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for dalai operations.
pub type Result<T> = std::result::Result<T, DalaiError>;

impl From<std::io::Error> for DalaiError {
    fn from(err: std::io::Error) -> Self {
        DalaiError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for DalaiError {
    fn from(err: reqwest::Error) -> Self {
        DalaiError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl DalaiError {
    /// Create an IO error with an operation description and path context.
    pub fn io(context: &str, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        DalaiError::Io {
            message: format!("{context}: {err}"),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// True for errors raised before any work started.
    pub fn is_validation(&self) -> bool {
        matches!(self, DalaiError::InvalidModel { .. })
    }
}
