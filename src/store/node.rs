//! Hierarchy node representation

use crate::types::{Attributes, NodeKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single organization or site in the hierarchy.
///
/// `parent` is the already-normalized parent key; the organization/site
/// distinction is resolved during ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub key: NodeKey,
    #[serde(default)]
    pub parent: Option<NodeKey>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub is_placeholder: bool,
}

impl Node {
    /// Create a node with no attributes
    pub fn new(key: impl Into<NodeKey>, parent: Option<NodeKey>) -> Self {
        Self {
            key: key.into(),
            parent,
            attributes: Attributes::new(),
            is_placeholder: false,
        }
    }

    /// Create a root node (no parent)
    pub fn root(key: impl Into<NodeKey>) -> Self {
        Self::new(key, None)
    }

    /// Create a node under `parent`
    pub fn child(key: impl Into<NodeKey>, parent: impl Into<NodeKey>) -> Self {
        Self::new(key, Some(parent.into()))
    }

    /// Create a provisional node that stands in for data not yet loaded
    pub fn placeholder(key: impl Into<NodeKey>, parent: impl Into<NodeKey>) -> Self {
        Self {
            is_placeholder: true,
            ..Self::child(key, parent)
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Display label: `displayName`, then `name`, then the key itself.
    pub fn label(&self) -> &str {
        ["displayName", "name"]
            .iter()
            .filter_map(|field| self.attributes.get(*field))
            .filter_map(Value::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or(self.key.as_str())
    }
}
