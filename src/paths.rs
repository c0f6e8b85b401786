//! Path Resolver
//!
//! Computes root-to-node key paths by walking declared parents and memoizes
//! every path it computes along the way. Structural changes invalidate a
//! node's whole subtree; paths are recomputed lazily on the next lookup.

use crate::error::PathError;
use crate::store::RecordStore;
use crate::types::{NodeKey, Path};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Memoizing path resolver.
///
/// Lookups take `&self` so they can run against a read-locked index; the
/// cache sits behind its own mutex.
#[derive(Debug, Default)]
pub struct PathResolver {
    cache: Mutex<HashMap<NodeKey, Path>>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path from the root down to `key`, inclusive.
    pub fn path_of(&self, store: &RecordStore, key: &str) -> Result<Path, PathError> {
        if !store.contains(key) {
            return Err(PathError::UnknownKey(key.to_string()));
        }

        let mut cache = self.cache.lock();
        if let Some(path) = cache.get(key) {
            return Ok(path.clone());
        }

        // Walk upward until a root or a cached ancestor.
        let mut uncached: Vec<&str> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = key;
        let mut path = loop {
            if !visited.insert(current) {
                return Err(PathError::CycleDetected(key.to_string()));
            }
            uncached.push(current);
            match store.parent_of(current) {
                None => break Path::new(),
                Some(parent) => {
                    if let Some(cached) = cache.get(parent.as_str()) {
                        break cached.clone();
                    }
                    if !store.contains(parent) {
                        return Err(PathError::Orphan {
                            key: current.to_string(),
                            missing_parent: parent.clone(),
                        });
                    }
                    current = parent.as_str();
                }
            }
        };

        for node in uncached.into_iter().rev() {
            path.push(node.to_string());
            cache.insert(node.to_string(), path.clone());
        }
        Ok(path)
    }

    /// Drop the cached paths of `key` and all its attached descendants.
    ///
    /// Returns every key in the subtree, parents before children.
    pub fn invalidate(&mut self, store: &RecordStore, key: &str) -> Vec<NodeKey> {
        let cache = self.cache.get_mut();
        let mut stack = vec![key.to_string()];
        let mut visited = HashSet::new();
        let mut subtree = Vec::new();

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            cache.remove(&current);
            stack.extend(store.children_of(&current).iter().rev().cloned());
            subtree.push(current);
        }
        subtree
    }

    pub fn clear(&mut self) {
        self.cache.get_mut().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.lock().contains_key(key)
    }
}
