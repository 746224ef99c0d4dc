use std::path::PathBuf;

use volley::{ConfigError, DeployError, SenderError};

/// Errors of the volley commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Failed to load the sender configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A sender operation failed.
    #[error(transparent)]
    Sender(#[from] SenderError),

    /// A deployment failed.
    #[error(transparent)]
    Deploy(#[from] DeployError),

    /// Failed to read or write a file.
    #[error("{path}: {source}")]
    File {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Failed to (de)serialize JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A call target is neither an address nor a known deployment.
    #[error("unknown call target '{0}'")]
    UnknownTarget(String),

    /// Failed to set up logging.
    #[error("failed to initialize logging: {0}")]
    Logging(std::io::Error),
}

/// Result type of the volley commands.
pub type Result<T> = std::result::Result<T, CliError>;

/// Reads the file at `path` to a string.
pub fn read_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| CliError::File { path: path.to_path_buf(), source })
}
