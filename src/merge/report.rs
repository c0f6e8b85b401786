//! Batch results handed to the display side.

use crate::types::{NodeKey, Path};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What happened to an attached row in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowChange {
    /// Created by this batch
    Inserted,
    /// Attributes replaced in place
    Updated,
    /// Placeholder replaced in place by real data
    Superseded,
    /// Own parent changed
    Moved,
    /// Was orphaned, now reachable from a root
    Attached,
    /// Unchanged itself, but an ancestor moved or attached
    PathChanged,
}

/// Why a directive was not applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// The parent assignment would make the node its own ancestor
    CycleDetected { parent: NodeKey },
    /// Delete of a key that is not in the store
    UnknownDeleteTarget,
    /// Record without a key
    MissingKey,
    /// Record that could not be read at all
    Malformed { detail: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::CycleDetected { parent } => {
                write!(f, "cycle detected (parent {})", parent)
            }
            RejectReason::UnknownDeleteTarget => write!(f, "unknown delete target"),
            RejectReason::MissingKey => write!(f, "missing key"),
            RejectReason::Malformed { detail } => write!(f, "malformed record: {}", detail),
        }
    }
}

/// A rejected directive. `index` is the directive's position in its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<NodeKey>,
    #[serde(flatten)]
    pub reason: RejectReason,
}

/// Visible delta of one applied batch.
///
/// Consumers apply `removed` first, then insert or update `attached` in order;
/// every attached key's parent row is already present by the time it is reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Keys to insert or update, parents before children
    pub attached: Vec<NodeKey>,
    /// Root-to-node path of every attached key
    pub paths: BTreeMap<NodeKey, Path>,
    /// Kind of change for every attached key
    pub changes: BTreeMap<NodeKey, RowChange>,
    /// Keys deleted by the batch
    pub removed: Vec<NodeKey>,
    /// Affected keys that are present but not reachable from a root
    pub orphaned: BTreeSet<NodeKey>,
    pub rejected: Vec<Rejection>,
}

impl BatchReport {
    /// True if the batch changed nothing visible
    pub fn is_noop(&self) -> bool {
        self.attached.is_empty() && self.removed.is_empty() && self.orphaned.is_empty()
    }

    pub fn path(&self, key: &str) -> Option<&Path> {
        self.paths.get(key)
    }

    pub fn change(&self, key: &str) -> Option<RowChange> {
        self.changes.get(key).copied()
    }

    /// Attached rows in rendering order with their path and change kind
    pub fn rows(&self) -> impl Iterator<Item = (&NodeKey, &Path, Option<RowChange>)> + '_ {
        self.attached.iter().filter_map(move |key| {
            self.paths
                .get(key)
                .map(|path| (key, path, self.changes.get(key).copied()))
        })
    }

    /// One-line summary used in logs and CLI output
    pub fn summary(&self) -> String {
        format!(
            "attached={} removed={} orphaned={} rejected={}",
            self.attached.len(),
            self.removed.len(),
            self.orphaned.len(),
            self.rejected.len()
        )
    }
}
