//! Error types for Burrow operations

use std::path::PathBuf;
use std::time::Duration;

/// Result type for Burrow operations
pub type Result<T> = std::result::Result<T, BurrowError>;

/// Error types for the workspace tool server
#[derive(Debug, thiserror::Error)]
pub enum BurrowError {
    /// Resolved path lies outside the workspace root
    #[error("Cannot leave the workspace directory: {}", .0.display())]
    Containment(PathBuf),

    /// Target of a directory change is missing or not a directory
    #[error("Directory does not exist: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Target file of a read/update/delete does not exist
    #[error("File '{}' does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// No managed process is registered under this pid
    #[error("No running process with PID {0}")]
    ProcessNotFound(u32),

    /// Command or script execution failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Synchronous execution exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Caller supplied an argument the operation cannot honour
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for BurrowError {
    fn from(s: String) -> Self {
        BurrowError::Other(s)
    }
}

impl From<&str> for BurrowError {
    fn from(s: &str) -> Self {
        BurrowError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for BurrowError {
    fn from(err: anyhow::Error) -> Self {
        BurrowError::Other(err.to_string())
    }
}

impl From<figment::Error> for BurrowError {
    fn from(err: figment::Error) -> Self {
        BurrowError::Configuration(err.to_string())
    }
}
