//! Configuration
//!
//! Layered configuration for the hierarchy service: defaults, global file,
//! explicit file, then `ORGTREE__*` environment variables.

mod loader;

pub use loader::ConfigLoader;

use crate::ingest::ParentPreference;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgTreeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub queue: QueueConfig,
}

/// Record normalization settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Which parent reference wins when a record carries both
    #[serde(default)]
    pub parent_preference: ParentPreference,
}

/// Merge queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of batches waiting to be applied
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    64
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}
