//! Error types for the hierarchy index, ingestion, and the crate-facing API.

use crate::types::NodeKey;
use thiserror::Error;

/// Record Store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("Assigning parent {parent} to {key} would make {key} its own ancestor")]
    CycleDetected { key: NodeKey, parent: NodeKey },

    #[error("Record has no key")]
    MissingKey,
}

/// Path resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Unknown key: {0}")]
    UnknownKey(NodeKey),

    /// `key` is the nearest node on the walk whose parent is not in the store.
    #[error("{key} is orphaned: parent {missing_parent} is not present")]
    Orphan {
        key: NodeKey,
        missing_parent: NodeKey,
    },

    #[error("Cycle detected while resolving the path of {0}")]
    CycleDetected(NodeKey),
}

/// Batch ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid batch document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-facing API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Merge queue is closed")]
    QueueClosed,

    #[error("Merge queue is full ({0} batches pending)")]
    QueueFull(usize),

    #[error("Subtree loader failed for {key}: {message}")]
    Loader { key: NodeKey, message: String },
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
