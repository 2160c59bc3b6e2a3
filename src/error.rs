use std::path::PathBuf;

use thiserror::Error;

/// Main error type for index construction and retrieval
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record in {context}: {reason}")]
    CorruptRecord { context: String, reason: String },

    #[error("Index not found or incomplete at {0}")]
    IndexNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Build a `CorruptRecord` error
    pub fn corrupt(context: impl Into<String>, reason: impl Into<String>) -> Self {
        IndexError::CorruptRecord {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must abort an in-progress build.
    ///
    /// A build has no recoverable failure modes: a partition or index file
    /// that could not be written or re-read invalidates the whole run.
    pub fn is_build_fatal(&self) -> bool {
        matches!(
            self,
            IndexError::Io(_) | IndexError::CorruptRecord { .. } | IndexError::Config(_)
        )
    }
}
