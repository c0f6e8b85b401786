//! Topological Sequencer
//!
//! Orders a set of keys so that every key's parent (when the parent is part of
//! the same set) comes before it. Detached keys are left out; they become
//! eligible once the orphan resolver attaches them.

use crate::types::NodeKey;
use std::collections::HashSet;

/// Read access to the hierarchy needed for sequencing
pub trait ParentLookup {
    /// Declared parent of `key`
    fn parent_of(&self, key: &str) -> Option<&NodeKey>;

    /// True if `key` has a complete path to a root
    fn is_attached(&self, key: &str) -> bool;
}

/// Parents-before-children ordering of `keys`.
///
/// Visits keys in input order; each visit first emits the not-yet-visited
/// working-set ancestors of the key, top-down, then the key itself. Parents
/// outside the working set are assumed to be rendered already. Duplicate
/// input keys are emitted once. Same input and state give the same output.
pub fn order<'a, I, L>(keys: I, lookup: &'a L) -> Vec<NodeKey>
where
    I: IntoIterator<Item = &'a NodeKey>,
    L: ParentLookup,
{
    let working: Vec<&'a str> = keys.into_iter().map(String::as_str).collect();
    let in_set: HashSet<&'a str> = working.iter().copied().collect();
    let mut visited: HashSet<&'a str> = HashSet::with_capacity(working.len());
    let mut ordered = Vec::with_capacity(working.len());

    for key in working {
        let mut chain: Vec<&'a str> = Vec::new();
        let mut on_chain: HashSet<&'a str> = HashSet::new();
        let mut current = Some(key);
        while let Some(node) = current {
            if visited.contains(node) || !in_set.contains(node) || !on_chain.insert(node) {
                break;
            }
            chain.push(node);
            current = lookup.parent_of(node).map(String::as_str);
        }

        for node in chain.into_iter().rev() {
            visited.insert(node);
            if lookup.is_attached(node) {
                ordered.push(node.to_string());
            }
        }
    }

    ordered
}
