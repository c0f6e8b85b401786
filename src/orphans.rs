//! Orphan Resolver
//!
//! Tracks nodes whose declared parent is not in the store yet and links them
//! as soon as that parent arrives. An orphan whose parent never arrives simply
//! stays registered.

use crate::store::RecordStore;
use crate::types::NodeKey;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Waiting index: missing parent key -> children waiting on it
#[derive(Debug, Default)]
pub struct OrphanResolver {
    /// missing parent -> waiting children, in registration order
    waiting: HashMap<NodeKey, Vec<NodeKey>>,
    /// child -> missing parent it waits on
    orphans: HashMap<NodeKey, NodeKey>,
}

impl OrphanResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `child` as waiting on `missing_parent`, replacing any previous registration
    pub(crate) fn register_orphan(&mut self, child: &str, missing_parent: &str) {
        self.unregister(child);
        self.waiting
            .entry(missing_parent.to_string())
            .or_default()
            .push(child.to_string());
        self.orphans
            .insert(child.to_string(), missing_parent.to_string());
    }

    /// Forget `child`'s registration. Returns the parent it was waiting on.
    pub(crate) fn unregister(&mut self, child: &str) -> Option<NodeKey> {
        let parent = self.orphans.remove(child)?;
        if let Some(children) = self.waiting.get_mut(&parent) {
            children.retain(|waiting| waiting != child);
            if children.is_empty() {
                self.waiting.remove(&parent);
            }
        }
        Some(parent)
    }

    pub fn is_orphan(&self, key: &str) -> bool {
        self.orphans.contains_key(key)
    }

    /// Children currently waiting on `parent`
    pub fn waiting_on(&self, parent: &str) -> &[NodeKey] {
        self.waiting.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All registered orphans with the parent each one waits on
    pub fn orphans(&self) -> impl Iterator<Item = (&NodeKey, &NodeKey)> {
        self.orphans.iter()
    }

    pub fn len(&self) -> usize {
        self.orphans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty()
    }

    /// Try to attach a single registered orphan. Returns true if it is now linked.
    pub fn try_resolve(&mut self, store: &mut RecordStore, key: &str) -> bool {
        let Some(parent) = self.orphans.get(key).cloned() else {
            return false;
        };
        if !store.contains(&parent) {
            return false;
        }
        self.unregister(key);
        store.link(key, &parent)
    }

    /// Attach every orphan waiting on one of `candidate_parents`.
    ///
    /// Each newly attached node is offered as a candidate in turn, so chains of
    /// waiting nodes resolve in one call. Registrations that no longer match the
    /// store (child gone or re-parented) are dropped. Returns the newly attached
    /// keys in resolution order.
    pub(crate) fn resolve_all<I>(&mut self, store: &mut RecordStore, candidate_parents: I) -> Vec<NodeKey>
    where
        I: IntoIterator<Item = NodeKey>,
    {
        let mut queue: VecDeque<NodeKey> = candidate_parents.into_iter().collect();
        let mut attached = Vec::new();

        while let Some(parent) = queue.pop_front() {
            if !store.contains(&parent) {
                continue;
            }
            let Some(children) = self.waiting.remove(&parent) else {
                continue;
            };
            for child in children {
                self.orphans.remove(&child);
                if store.link(&child, &parent) {
                    debug!(child = %child, parent = %parent, "Resolved orphan");
                    queue.push_back(child.clone());
                    attached.push(child);
                }
            }
        }

        attached
    }
}
