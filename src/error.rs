//! Error types for mrcprep.

use thiserror::Error;

/// Result type for mrcprep operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mrcprep operations.
///
/// All pipeline failures below the stream boundary are soft outcomes
/// (dropped fragments, empty labels) and never surface here; this enum
/// covers the genuinely fatal paths: I/O and malformed configuration.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Dataset loading/writing error.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create a dataset error.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Error::Dataset(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}
