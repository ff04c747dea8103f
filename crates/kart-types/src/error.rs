use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid dataset path: {0}")]
    InvalidDatasetPath(String),

    #[error("unsupported repository version: {0} (only 2 and 3 are supported)")]
    UnsupportedRepoVersion(u32),
}
