//! Lazy Expansion
//!
//! Expanding a node asks a [`SubtreeLoader`] for its children. Loaders may
//! answer slowly; meanwhile the node can be collapsed and expanded again. Each
//! request carries a generation ticket so that a late answer is still merged
//! (merging is idempotent) but reported as stale.

use crate::error::ApiError;
use crate::merge::{Batch, BatchReport};
use crate::queue::{BatchSource, MergeQueue};
use crate::store::Node;
use crate::types::NodeKey;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of child records for an expanded node
#[async_trait]
pub trait SubtreeLoader: Send + Sync {
    /// Fetch the batch for `key`'s subtree
    async fn load_children(&self, key: &str) -> Result<Batch, ApiError>;

    /// Provisional children to show while `load_children` is in flight.
    ///
    /// Real records with the same keys supersede them.
    fn placeholders(&self, _key: &str) -> Vec<Node> {
        Vec::new()
    }
}

/// Generation ticket for one expansion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionTicket {
    pub key: NodeKey,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct ExpansionEntry {
    generation: u64,
    expanded: bool,
}

/// Per-node expand/collapse state
#[derive(Debug, Default)]
pub struct ExpansionTracker {
    entries: Mutex<HashMap<NodeKey, ExpansionEntry>>,
}

impl ExpansionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` expanded and issue a ticket that supersedes all earlier ones
    pub fn expand(&self, key: &str) -> ExpansionTicket {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_string()).or_default();
        entry.generation += 1;
        entry.expanded = true;
        ExpansionTicket {
            key: key.to_string(),
            generation: entry.generation,
        }
    }

    /// Mark `key` collapsed; outstanding tickets become stale
    pub fn collapse(&self, key: &str) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_string()).or_default();
        entry.generation += 1;
        entry.expanded = false;
    }

    /// Flip the state of `key`. Returns a ticket when the toggle expands.
    pub fn toggle(&self, key: &str) -> Option<ExpansionTicket> {
        if self.is_expanded(key) {
            self.collapse(key);
            None
        } else {
            Some(self.expand(key))
        }
    }

    pub fn is_expanded(&self, key: &str) -> bool {
        self.entries
            .lock()
            .get(key)
            .map(|entry| entry.expanded)
            .unwrap_or(false)
    }

    /// A ticket is current while no later expand/collapse happened on its key
    pub fn is_current(&self, ticket: &ExpansionTicket) -> bool {
        self.entries
            .lock()
            .get(&ticket.key)
            .map(|entry| entry.expanded && entry.generation == ticket.generation)
            .unwrap_or(false)
    }
}

/// Result of one expansion request
#[derive(Debug, Clone)]
pub struct ExpansionOutcome {
    pub key: NodeKey,
    pub generation: u64,
    /// A later toggle on the same key happened while the loader was running
    pub stale: bool,
    /// Report of the placeholder batch, if one was applied
    pub placeholder_report: Option<BatchReport>,
    pub report: BatchReport,
}

/// Drives expansions through the merge queue
pub struct Expander<L> {
    queue: Arc<MergeQueue>,
    loader: Arc<L>,
    tracker: ExpansionTracker,
}

impl<L: SubtreeLoader> Expander<L> {
    pub fn new(queue: Arc<MergeQueue>, loader: Arc<L>) -> Self {
        Self {
            queue,
            loader,
            tracker: ExpansionTracker::new(),
        }
    }

    pub fn tracker(&self) -> &ExpansionTracker {
        &self.tracker
    }

    /// Expand `key`: show placeholders, load the children, merge them.
    pub async fn expand(&self, key: &str) -> Result<ExpansionOutcome, ApiError> {
        let ticket = self.tracker.expand(key);
        debug!(key, generation = ticket.generation, "Expansion requested");

        // Provisional directives are dropped by the writer if the key exists by
        // then, so queued real data is never downgraded. The filter only skips
        // a round trip for keys already applied.
        let placeholders = self
            .loader
            .placeholders(key)
            .into_iter()
            .filter(|node| !self.queue.contains(&node.key))
            .fold(Batch::new(), Batch::provisional);
        let placeholder_report = if placeholders.is_empty() {
            None
        } else {
            let source = BatchSource::Expansion(key.to_string());
            Some(self.queue.submit(source, placeholders).await?)
        };

        let batch = self.loader.load_children(key).await?;
        let report = self
            .queue
            .submit(BatchSource::Expansion(key.to_string()), batch)
            .await?;

        let stale = !self.tracker.is_current(&ticket);
        if stale {
            warn!(
                key,
                generation = ticket.generation,
                "Expansion superseded while loading; merged anyway"
            );
        }

        Ok(ExpansionOutcome {
            key: ticket.key,
            generation: ticket.generation,
            stale,
            placeholder_report,
            report,
        })
    }

    pub fn collapse(&self, key: &str) {
        self.tracker.collapse(key);
    }
}
