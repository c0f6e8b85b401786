//! Merge Engine
//!
//! Single entry point for hierarchy mutations. A batch of directives is applied
//! in order against the record store; afterwards waiting orphans are resolved,
//! stale paths invalidated, and the affected keys sequenced parents-first into
//! a [`BatchReport`].

pub mod report;

pub use report::{BatchReport, RejectReason, Rejection, RowChange};

use crate::error::{IndexError, PathError};
use crate::orphans::OrphanResolver;
use crate::paths::PathResolver;
use crate::sequencer::{self, ParentLookup};
use crate::store::{Link, Node, RecordStore, UpsertOutcome};
use crate::types::{NodeKey, Path};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One mutation inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Upsert(Node),
    /// Upsert applied only if the key is absent when the batch runs
    Provisional(Node),
    Delete(NodeKey),
    /// Input that could not be turned into a directive; always rejected
    Invalid(RejectReason),
}

impl Directive {
    pub fn key(&self) -> Option<&str> {
        match self {
            Directive::Upsert(node) | Directive::Provisional(node) if !node.key.is_empty() => {
                Some(node.key.as_str())
            }
            Directive::Delete(key) if !key.is_empty() => Some(key.as_str()),
            _ => None,
        }
    }
}

/// Ordered, atomically applied unit of directives
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub directives: Vec<Directive>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(mut self, node: Node) -> Self {
        self.directives.push(Directive::Upsert(node));
        self
    }

    /// Add a node that must not replace an existing record (e.g. a placeholder)
    pub fn provisional(mut self, node: Node) -> Self {
        self.directives.push(Directive::Provisional(node));
        self
    }

    pub fn delete(mut self, key: impl Into<NodeKey>) -> Self {
        self.directives.push(Directive::Delete(key.into()));
        self
    }

    pub fn push(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

impl From<Vec<Directive>> for Batch {
    fn from(directives: Vec<Directive>) -> Self {
        Self { directives }
    }
}

impl FromIterator<Node> for Batch {
    fn from_iter<T: IntoIterator<Item = Node>>(iter: T) -> Self {
        Self {
            directives: iter.into_iter().map(Directive::Upsert).collect(),
        }
    }
}

/// Per-batch bookkeeping while directives are applied
#[derive(Default)]
struct Staging {
    /// Keys that may satisfy waiting orphans
    candidates: Vec<NodeKey>,
    /// Keys whose content or linkage changed, in change order
    affected: Vec<NodeKey>,
    changes: HashMap<NodeKey, RowChange>,
    removed: Vec<NodeKey>,
    rejected: Vec<Rejection>,
}

impl Staging {
    fn record(&mut self, key: &str, change: RowChange) {
        self.affected.push(key.to_string());
        let entry = self.changes.entry(key.to_string()).or_insert(change);
        // Created or moved earlier in the batch wins over later in-place edits
        if !matches!(*entry, RowChange::Inserted | RowChange::Moved) {
            *entry = change;
        }
    }

    fn reject(&mut self, index: usize, key: Option<&str>, reason: RejectReason) {
        warn!(index, key = ?key, reason = %reason, "Rejected directive");
        self.rejected.push(Rejection {
            index,
            key: key.map(str::to_string),
            reason,
        });
    }
}

/// The hierarchy index and its single mutation path
#[derive(Debug, Default)]
pub struct MergeEngine {
    store: RecordStore,
    orphans: OrphanResolver,
    paths: PathResolver,
    batches_applied: u64,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch and report the visible delta.
    ///
    /// Directives run in order, so a record may name a parent that appears
    /// later in the same batch. Rejected directives leave no trace in the index.
    pub fn apply_batch(&mut self, batch: Batch) -> BatchReport {
        let start = Instant::now();
        let directive_count = batch.len();
        let mut staging = Staging::default();

        for (index, directive) in batch.directives.into_iter().enumerate() {
            match directive {
                Directive::Upsert(node) => self.apply_upsert(index, node, &mut staging),
                Directive::Provisional(node) => {
                    if self.store.contains(&node.key) {
                        debug!(key = %node.key, "Provisional node skipped, key present");
                    } else {
                        self.apply_upsert(index, node, &mut staging);
                    }
                }
                Directive::Delete(key) => self.apply_delete(index, &key, &mut staging),
                Directive::Invalid(reason) => staging.reject(index, None, reason),
            }
        }

        let newly_attached = self
            .orphans
            .resolve_all(&mut self.store, staging.candidates.drain(..));
        let newly_attached: HashSet<NodeKey> = newly_attached.into_iter().collect();

        let mut working: Vec<NodeKey> = Vec::new();
        let mut seen: HashSet<NodeKey> = HashSet::new();
        for key in self.store.take_dirty() {
            for invalidated in self.paths.invalidate(&self.store, &key) {
                if seen.insert(invalidated.clone()) {
                    working.push(invalidated);
                }
            }
        }
        for key in staging.affected.drain(..).chain(newly_attached.iter().cloned()) {
            if seen.insert(key.clone()) {
                working.push(key);
            }
        }
        working.retain(|key| self.store.contains(key));

        let attached = sequencer::order(&working, &*self);
        let mut report = BatchReport {
            removed: staging.removed,
            rejected: staging.rejected,
            ..BatchReport::default()
        };
        for key in &attached {
            if let Ok(path) = self.paths.path_of(&self.store, key) {
                report.paths.insert(key.clone(), path);
            }
            let change = staging.changes.get(key).copied().unwrap_or_else(|| {
                if self.hangs_under(key, &newly_attached) {
                    RowChange::Attached
                } else {
                    RowChange::PathChanged
                }
            });
            report.changes.insert(key.clone(), change);
        }
        let attached_set: HashSet<&NodeKey> = attached.iter().collect();
        report.orphaned = working
            .iter()
            .filter(|key| !attached_set.contains(key))
            .cloned()
            .collect();
        report.attached = attached;

        self.batches_applied += 1;
        info!(
            batch = self.batches_applied,
            directives = directive_count,
            attached = report.attached.len(),
            removed = report.removed.len(),
            orphaned = report.orphaned.len(),
            rejected = report.rejected.len(),
            duration_us = start.elapsed().as_micros() as u64,
            "Applied batch"
        );
        report
    }

    fn apply_upsert(&mut self, index: usize, node: Node, staging: &mut Staging) {
        let key = node.key.clone();
        match self.store.upsert(node) {
            Ok(UpsertOutcome::Unchanged) => {
                debug!(key = %key, "Upsert unchanged");
            }
            Ok(UpsertOutcome::Updated) => staging.record(&key, RowChange::Updated),
            Ok(UpsertOutcome::Superseded) => {
                debug!(key = %key, "Placeholder superseded");
                staging.record(&key, RowChange::Superseded);
            }
            Ok(UpsertOutcome::Created(link)) => {
                self.track_link(&key, link);
                staging.candidates.push(key.clone());
                staging.record(&key, RowChange::Inserted);
            }
            Ok(UpsertOutcome::Moved { from, link }) => {
                debug!(key = %key, from = ?from, "Parent changed");
                self.orphans.unregister(&key);
                self.track_link(&key, link);
                staging.candidates.push(key.clone());
                staging.record(&key, RowChange::Moved);
            }
            Err(IndexError::CycleDetected { parent, .. }) => {
                staging.reject(index, Some(key.as_str()), RejectReason::CycleDetected { parent })
            }
            Err(IndexError::MissingKey) => staging.reject(index, None, RejectReason::MissingKey),
        }
    }

    fn apply_delete(&mut self, index: usize, key: &str, staging: &mut Staging) {
        if key.is_empty() {
            staging.reject(index, None, RejectReason::MissingKey);
            return;
        }
        let Some(deleted) = self.store.delete(key) else {
            staging.reject(index, Some(key), RejectReason::UnknownDeleteTarget);
            return;
        };

        self.orphans.unregister(key);
        for child in &deleted.orphaned_children {
            self.orphans.register_orphan(child, key);
            staging.affected.push(child.clone());
        }
        debug!(
            key = %key,
            orphaned_children = deleted.orphaned_children.len(),
            "Deleted node"
        );
        staging.changes.remove(key);
        staging.removed.push(key.to_string());
    }

    /// True if `key` or one of its ancestors is in `keys`.
    ///
    /// Everything below a freshly attached orphan was detached before the batch.
    fn hangs_under(&self, key: &str, keys: &HashSet<NodeKey>) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(key);
        while let Some(k) = current {
            if keys.contains(k) {
                return true;
            }
            if !visited.insert(k) {
                return false;
            }
            current = self.store.parent_of(k).map(String::as_str);
        }
        false
    }

    fn track_link(&mut self, key: &str, link: Link) {
        if let Link::Orphaned { missing_parent } = link {
            debug!(key = %key, missing_parent = %missing_parent, "Registered orphan");
            self.orphans.register_orphan(key, &missing_parent);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.store.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    pub fn children_of(&self, key: &str) -> &[NodeKey] {
        self.store.children_of(key)
    }

    /// Root-to-node path of `key`
    pub fn path_of(&self, key: &str) -> Result<Path, PathError> {
        self.paths.path_of(&self.store, key)
    }

    /// Parents-before-children ordering of `keys` against the current state
    pub fn order<'a, I>(&'a self, keys: I) -> Vec<NodeKey>
    where
        I: IntoIterator<Item = &'a NodeKey>,
    {
        sequencer::order(keys, self)
    }

    /// Registered orphans with the parent each waits on, sorted by key
    pub fn orphans(&self) -> Vec<(NodeKey, NodeKey)> {
        let mut orphans: Vec<(NodeKey, NodeKey)> = self
            .orphans
            .orphans()
            .map(|(child, parent)| (child.clone(), parent.clone()))
            .collect();
        orphans.sort();
        orphans
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn batches_applied(&self) -> u64 {
        self.batches_applied
    }
}

impl ParentLookup for MergeEngine {
    fn parent_of(&self, key: &str) -> Option<&NodeKey> {
        self.store.parent_of(key)
    }

    fn is_attached(&self, key: &str) -> bool {
        self.path_of(key).is_ok()
    }
}
