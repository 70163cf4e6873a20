//! Error types for the ngspice backend.

use thiserror::Error;

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running ngspice.
#[derive(Debug, Error)]
pub enum Error {
    /// ngspice is not installed or not found in PATH.
    #[error("ngspice not found: {0}")]
    NgspiceNotFound(String),

    /// ngspice ran but reported failure.
    #[error("ngspice execution failed: {0}")]
    NgspiceExecutionFailed(String),

    #[error("ngspice timed out after {0} seconds")]
    NgspiceTimeout(u64),

    /// The rawfile ngspice wrote could not be read.
    #[error("failed to parse rawfile: {0}")]
    RawfileParseError(String),

    #[error("temp file error: {0}")]
    TempFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
