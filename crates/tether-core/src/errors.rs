//! Error types for tether-core.

use std::path::PathBuf;

use thiserror::Error;

/// Domain-specific errors for tether operations.
///
/// Most public connection operations never surface these: the facade logs
/// them and degrades to `false` or an empty result. They are returned by the
/// lower layers (store, migration, configuration) so callers that care can
/// tell a storage failure from an ordinary "nothing there".
#[derive(Error, Debug)]
pub enum TetherError {
    /// Configuration file exists but could not be read or parsed.
    #[error("Config invalid: {0}")]
    InvalidConfig(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// The connection type name is not registered.
    #[error("Connection type `{0}` is not registered.")]
    UnknownConnectionType(String),

    /// An entity kind string could not be parsed.
    #[error("Unknown entity kind `{0}`: use item, term or principal.")]
    InvalidEntityKind(String),

    /// Invalid argument provided to an operation.
    #[error("{0}")]
    InvalidArgument(String),

    /// The entity directory snapshot could not be loaded.
    #[error("Entity directory load error at `{path}`: {message}")]
    DirectoryLoad {
        /// Path of the snapshot file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A directory query was malformed (e.g. unknown taxonomy).
    #[error("Entity directory query failed: {message}")]
    DirectoryQuery {
        /// Description of the failure.
        message: String,
    },

    /// Attribute store I/O error.
    #[error("Attribute store I/O error at `{path}`: {message}")]
    AttributeStoreIo {
        /// Path to the attribute file.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// Attribute store parse error.
    #[error("Attribute store parse error at `{path}`: {message}")]
    AttributeStoreParse {
        /// Path to the attribute file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Attribute store failure without a path (locks, configuration).
    #[error("Attribute store error: {0}")]
    AttributeStore(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A wrapped generic error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
