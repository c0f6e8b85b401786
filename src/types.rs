//! Core types for the organization hierarchy index.

use serde_json::Value;
use std::collections::BTreeMap;

/// NodeKey: Opaque, stable identifier of an organization or site
pub type NodeKey = String;

/// Path: Ordered key sequence from a root down to (and including) a node
pub type Path = Vec<NodeKey>;

/// Attributes: Opaque record payload (display name, contact fields, location, ...)
///
/// Ordered so that equality and serialization are deterministic.
pub type Attributes = BTreeMap<String, Value>;
