//! Merge Queue
//!
//! Single-writer front end for the [`MergeEngine`]. Producers (bulk load, lazy
//! expansion, user edits) submit batches concurrently; one worker task applies
//! them in arrival order under the engine's write lock. Readers take the read
//! lock and only ever see fully applied batches.

use crate::config::QueueConfig;
use crate::error::{ApiError, PathError};
use crate::merge::{Batch, BatchReport, MergeEngine};
use crate::store::Node;
use crate::types::{NodeKey, Path};
use crate::views::{self, TreeRow};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Who asked for a batch to be merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSource {
    /// Initial or periodic full load from the data source
    BulkLoad,
    /// Children arriving for an expanded node
    Expansion(NodeKey),
    UserEdit,
}

impl fmt::Display for BatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchSource::BulkLoad => write!(f, "bulk_load"),
            BatchSource::Expansion(key) => write!(f, "expansion:{}", key),
            BatchSource::UserEdit => write!(f, "user_edit"),
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Batches submitted but not yet applied
    pub pending: usize,
    /// Batches applied since start
    pub applied: u64,
    /// Directives rejected across all applied batches
    pub rejected: u64,
    pub last_applied_at: Option<DateTime<Utc>>,
}

struct Submission {
    source: BatchSource,
    batch: Batch,
    reply: oneshot::Sender<BatchReport>,
}

/// A submitted batch whose report has not been collected yet
pub struct PendingReport {
    receiver: oneshot::Receiver<BatchReport>,
}

impl PendingReport {
    /// Wait for the worker to apply the batch
    pub async fn wait(self) -> Result<BatchReport, ApiError> {
        self.receiver.await.map_err(|_| ApiError::QueueClosed)
    }
}

/// Merge queue owning the engine
pub struct MergeQueue {
    engine: Arc<RwLock<MergeEngine>>,
    /// None once shut down
    sender: Mutex<Option<mpsc::Sender<Submission>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<RwLock<QueueStats>>,
    capacity: usize,
}

impl MergeQueue {
    /// Start the queue worker around `engine`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(engine: MergeEngine, config: &QueueConfig) -> Self {
        let capacity = config.capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let engine = Arc::new(RwLock::new(engine));
        let stats = Arc::new(RwLock::new(QueueStats::default()));

        let worker = tokio::spawn(Self::worker_loop(
            receiver,
            Arc::clone(&engine),
            Arc::clone(&stats),
        ));
        info!(capacity, "Started merge queue worker");

        Self {
            engine,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            stats,
            capacity,
        }
    }

    /// Submit a batch and wait for its report.
    ///
    /// Waits for room when the queue is full.
    pub async fn submit(&self, source: BatchSource, batch: Batch) -> Result<BatchReport, ApiError> {
        let sender = self.sender()?;
        let (reply, receiver) = oneshot::channel();
        self.stats.write().pending += 1;
        let submission = Submission {
            source,
            batch,
            reply,
        };
        if sender.send(submission).await.is_err() {
            self.release_pending();
            return Err(ApiError::QueueClosed);
        }
        PendingReport { receiver }.wait().await
    }

    /// Submit without waiting for room; fails with `QueueFull` instead.
    pub fn try_submit(&self, source: BatchSource, batch: Batch) -> Result<PendingReport, ApiError> {
        let sender = self.sender()?;
        let (reply, receiver) = oneshot::channel();
        let submission = Submission {
            source,
            batch,
            reply,
        };
        self.stats.write().pending += 1;
        match sender.try_send(submission) {
            Ok(()) => Ok(PendingReport { receiver }),
            Err(mpsc::error::TrySendError::Full(submission)) => {
                self.release_pending();
                warn!(
                    source = %submission.source,
                    capacity = self.capacity,
                    "Merge queue is full, refusing batch"
                );
                Err(ApiError::QueueFull(self.capacity))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.release_pending();
                Err(ApiError::QueueClosed)
            }
        }
    }

    /// Stop accepting batches, drain the pending ones, and join the worker
    pub async fn shutdown(&self) -> Result<(), ApiError> {
        // Dropping the last sender lets the worker exit once the channel drains.
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return Ok(());
        }
        drop(sender);

        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            handle
                .await
                .map_err(|e| ApiError::ConfigError(format!("Merge worker failed: {}", e)))?;
        }
        info!(applied = self.stats().applied, "Stopped merge queue worker");
        Ok(())
    }

    /// Shut down and take back the engine
    pub async fn into_engine(self) -> Result<MergeEngine, ApiError> {
        self.shutdown().await?;
        Arc::try_unwrap(self.engine)
            .map(RwLock::into_inner)
            .map_err(|_| ApiError::ConfigError("Merge engine is still shared".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.read().clone()
    }

    /// Run `f` against the engine as of the last applied batch
    pub fn with_engine<R>(&self, f: impl FnOnce(&MergeEngine) -> R) -> R {
        f(&self.engine.read())
    }

    pub fn path_of(&self, key: &str) -> Result<Path, PathError> {
        self.engine.read().path_of(key)
    }

    pub fn get(&self, key: &str) -> Option<Node> {
        self.engine.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.engine.read().contains(key)
    }

    /// Full tree listing, parents before children
    pub fn rows(&self) -> Vec<TreeRow> {
        views::tree_rows(&self.engine.read())
    }

    /// (orphan, missing parent) pairs
    pub fn orphans(&self) -> Vec<(NodeKey, NodeKey)> {
        self.engine.read().orphans()
    }

    fn sender(&self) -> Result<mpsc::Sender<Submission>, ApiError> {
        self.sender.lock().clone().ok_or(ApiError::QueueClosed)
    }

    fn release_pending(&self) {
        let mut stats = self.stats.write();
        stats.pending = stats.pending.saturating_sub(1);
    }

    async fn worker_loop(
        mut receiver: mpsc::Receiver<Submission>,
        engine: Arc<RwLock<MergeEngine>>,
        stats: Arc<RwLock<QueueStats>>,
    ) {
        debug!("Merge worker started");

        while let Some(submission) = receiver.recv().await {
            let Submission {
                source,
                batch,
                reply,
            } = submission;
            let directives = batch.len();

            let report = {
                let mut engine = engine.write();
                engine.apply_batch(batch)
            };

            {
                let mut stats = stats.write();
                stats.pending = stats.pending.saturating_sub(1);
                stats.applied += 1;
                stats.rejected += report.rejected.len() as u64;
                stats.last_applied_at = Some(Utc::now());
            }

            debug!(
                source = %source,
                directives,
                attached = report.attached.len(),
                "Applied queued batch"
            );

            if reply.send(report).is_err() {
                debug!(source = %source, "Submitter went away before the report was delivered");
            }
        }

        debug!("Merge worker stopped");
    }
}
