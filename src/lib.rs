//! orgtree: Incremental Organization/Site Hierarchy Index
//!
//! Maintains a forest of organizations and sites built from flat records that
//! name their parent by key. Batches may arrive out of order: children before
//! parents, placeholders before real data. The index keeps every node's
//! root-to-node path available and reports each batch's changes in an order
//! where parents always precede their children.

pub mod config;
pub mod error;
pub mod expansion;
pub mod ingest;
pub mod logging;
pub mod merge;
pub mod orphans;
pub mod paths;
pub mod queue;
pub mod sequencer;
pub mod store;
pub mod tooling;
pub mod types;
pub mod views;
