//! Record Store
//!
//! Ground truth for every known node: attributes, declared parent, and the
//! incrementally maintained child lists of attached nodes. Structural changes
//! are recorded as dirty keys for path cache invalidation.
//!
//! The store never links a waiting child to a parent that arrives later. The
//! merge engine does that through the orphan resolver, so mutators are
//! crate-private and writes go through [`crate::merge::MergeEngine`].

pub mod node;

pub use node::Node;

use crate::error::IndexError;
use crate::types::NodeKey;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// How a node relates to its declared parent after a store mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// No parent declared
    Root,
    /// Linked into the parent's child list
    Attached,
    /// Declared parent is not in the store
    Orphaned { missing_parent: NodeKey },
}

/// Result of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(Link),
    /// Parent changed; `from` is the previously declared parent
    Moved { from: Option<NodeKey>, link: Link },
    /// Attributes or placeholder flag replaced in place
    Updated,
    /// A placeholder was replaced in place by real data
    Superseded,
    Unchanged,
}

/// A node removed from the store, along with its former children (now orphans)
#[derive(Debug, Clone)]
pub struct Deleted {
    pub node: Node,
    pub orphaned_children: Vec<NodeKey>,
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    arrival: u64,
}

/// In-memory record store
#[derive(Debug, Default)]
pub struct RecordStore {
    nodes: HashMap<NodeKey, Slot>,
    /// parent -> attached children, in arrival order
    children: HashMap<NodeKey, Vec<NodeKey>>,
    dirty: Vec<NodeKey>,
    dirty_set: HashSet<NodeKey>,
    next_arrival: u64,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key).map(|slot| &slot.node)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Declared parent of `key`, whether or not that parent is present
    pub fn parent_of(&self, key: &str) -> Option<&NodeKey> {
        self.get(key).and_then(|node| node.parent.as_ref())
    }

    /// Attached children of `key` in arrival order
    pub fn children_of(&self, key: &str) -> &[NodeKey] {
        self.children.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All keys, in arrival order
    pub fn keys(&self) -> Vec<&NodeKey> {
        let mut slots: Vec<(&NodeKey, u64)> = self
            .nodes
            .iter()
            .map(|(key, slot)| (key, slot.arrival))
            .collect();
        slots.sort_by_key(|(_, arrival)| *arrival);
        slots.into_iter().map(|(key, _)| key).collect()
    }

    /// Nodes without a declared parent, in arrival order
    pub fn roots(&self) -> Vec<&NodeKey> {
        self.keys()
            .into_iter()
            .filter(|key| self.parent_of(key).is_none())
            .collect()
    }

    /// Insert or replace a node.
    ///
    /// Keeps the node's sibling position unless its parent changes. A parent
    /// assignment whose declared ancestor chain reaches the node itself is
    /// refused and leaves the store untouched.
    pub(crate) fn upsert(&mut self, node: Node) -> Result<UpsertOutcome, IndexError> {
        if node.key.is_empty() {
            return Err(IndexError::MissingKey);
        }
        if let Some(parent) = &node.parent {
            self.check_acyclic(&node.key, parent)?;
        }

        let key = node.key.clone();
        let previous_parent = match self.nodes.get_mut(&key) {
            Some(slot) => {
                if slot.node == node {
                    return Ok(UpsertOutcome::Unchanged);
                }
                if slot.node.parent == node.parent {
                    let superseded = slot.node.is_placeholder && !node.is_placeholder;
                    slot.node = node;
                    return Ok(if superseded {
                        UpsertOutcome::Superseded
                    } else {
                        UpsertOutcome::Updated
                    });
                }
                Some(std::mem::replace(&mut slot.node, node).parent)
            }
            None => {
                let arrival = self.next_arrival;
                self.next_arrival += 1;
                self.nodes.insert(key.clone(), Slot { node, arrival });
                None
            }
        };

        self.mark_dirty(&key);
        match previous_parent {
            Some(from) => {
                if let Some(old_parent) = &from {
                    self.unlink(old_parent, &key);
                }
                let link = self.link_declared(&key);
                trace!(key = %key, from = ?from, link = ?link, "Moved node");
                Ok(UpsertOutcome::Moved { from, link })
            }
            None => {
                let link = self.link_declared(&key);
                trace!(key = %key, link = ?link, "Created node");
                Ok(UpsertOutcome::Created(link))
            }
        }
    }

    /// Remove a node. Its children stay in the store, unlinked, still declaring
    /// the removed key as their parent.
    pub(crate) fn delete(&mut self, key: &str) -> Option<Deleted> {
        let slot = self.nodes.remove(key)?;
        if let Some(parent) = &slot.node.parent {
            self.unlink(parent, key);
        }
        let orphaned_children = self.children.remove(key).unwrap_or_default();

        self.mark_dirty(key);
        for child in &orphaned_children {
            self.mark_dirty(child);
        }

        Some(Deleted {
            node: slot.node,
            orphaned_children,
        })
    }

    /// Link `child` under `parent`.
    ///
    /// Succeeds only if both are present and `parent` is the child's declared
    /// parent. Linking an already linked child is a no-op that still succeeds.
    pub(crate) fn link(&mut self, child: &str, parent: &str) -> bool {
        if !self.contains(parent) || self.parent_of(child).map(String::as_str) != Some(parent) {
            return false;
        }
        let siblings = self.children.entry(parent.to_string()).or_default();
        if !siblings.iter().any(|sibling| sibling == child) {
            siblings.push(child.to_string());
            self.mark_dirty(child);
        }
        true
    }

    /// Drain the keys whose structure changed since the last call, in change order
    pub(crate) fn take_dirty(&mut self) -> Vec<NodeKey> {
        self.dirty_set.clear();
        std::mem::take(&mut self.dirty)
    }

    fn link_declared(&mut self, key: &str) -> Link {
        match self.parent_of(key).cloned() {
            None => Link::Root,
            Some(parent) if self.contains(&parent) => {
                self.link(key, &parent);
                Link::Attached
            }
            Some(parent) => Link::Orphaned {
                missing_parent: parent,
            },
        }
    }

    fn unlink(&mut self, parent: &str, child: &str) {
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.retain(|sibling| sibling != child);
            if siblings.is_empty() {
                self.children.remove(parent);
            }
        }
    }

    fn check_acyclic(&self, key: &str, parent: &str) -> Result<(), IndexError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(parent);
        while let Some(ancestor) = current {
            if ancestor == key {
                return Err(IndexError::CycleDetected {
                    key: key.to_string(),
                    parent: parent.to_string(),
                });
            }
            if !visited.insert(ancestor) {
                break;
            }
            current = self.parent_of(ancestor).map(String::as_str);
        }
        Ok(())
    }

    fn mark_dirty(&mut self, key: &str) {
        if self.dirty_set.insert(key.to_string()) {
            self.dirty.push(key.to_string());
        }
    }
}
