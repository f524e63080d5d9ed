//! Error types for the audit pipeline.

use thiserror::Error;

/// Errors that can occur while auditing repositories.
#[derive(Debug, Error)]
pub enum AuditError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// GitHub API returned a non-success status
    #[error("GitHub API error: {status} while {context}")]
    Status {
        status: reqwest::StatusCode,
        context: String,
    },

    /// Response body could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal failed
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// Archive is corrupt or could not be expanded
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = AuditError> = std::result::Result<T, E>;
