//! Error types for tether-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tether-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in tether-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Attribute file I/O error.
    #[error("Attribute store I/O error at {path}: {message}")]
    AttributeIo { path: PathBuf, message: String },

    /// Attribute file parse error.
    #[error("Attribute store parse error at {path}: {message}")]
    AttributeParse { path: PathBuf, message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error (poisoned locks and the like).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create an attribute I/O error.
    pub fn attribute_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::AttributeIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an attribute parse error.
    pub fn attribute_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::AttributeParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
