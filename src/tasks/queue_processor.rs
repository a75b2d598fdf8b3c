//! Inbound record queue processor.
//!
//! Synchronous-style task: each firing drains up to a configured number of
//! pending entries from the inbound record queue on the trigger's own tokio
//! task, marking each entry processed or failed. The queue itself is an
//! external collaborator behind the [`RecordQueue`] trait; an in-memory
//! implementation backs tests and the demo binary.

use crate::constants::{DEFAULT_BATCH_LIMIT, PROP_BATCH_LIMIT};
use crate::definition::TaskDefinition;
use crate::errors::QueueError;
use crate::tasks::{Task, TaskState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, instrument};

/// One pending inbound record awaiting processing.
#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub id: u64,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

/// Inbound record queue consumed by [`QueueProcessorTask`].
#[async_trait]
pub trait RecordQueue: Send + Sync {
    /// Fetch the next pending entry, if any.
    async fn next_pending(&self) -> Result<Option<QueueEntry>, QueueError>;

    /// Mark an entry successfully processed.
    async fn mark_processed(&self, entry_id: u64) -> Result<(), QueueError>;

    /// Mark an entry failed with a reason; failed entries are not retried by
    /// this task.
    async fn mark_failed(&self, entry_id: u64, reason: &str) -> Result<(), QueueError>;
}

/// Drains the inbound record queue on each scheduled firing.
///
/// Holds no per-run state beyond the executing flag: the queue handle is
/// constructed once and the batch limit is parsed once at `initialize` from
/// the definition's `batch_limit` property.
pub struct QueueProcessorTask {
    state: TaskState,
    queue: Arc<dyn RecordQueue>,
    batch_limit: AtomicU64,
}

impl QueueProcessorTask {
    pub fn new(state: TaskState, queue: Arc<dyn RecordQueue>) -> Self {
        Self {
            state,
            queue,
            batch_limit: AtomicU64::new(DEFAULT_BATCH_LIMIT),
        }
    }

    /// Process one entry. Empty payloads are malformed submissions and are
    /// marked failed rather than retried forever.
    async fn process_entry(&self, entry: &QueueEntry) -> Result<bool, QueueError> {
        if entry.payload.trim().is_empty() {
            self.queue
                .mark_failed(entry.id, "empty payload")
                .await?;
            return Ok(false);
        }

        debug!(
            entry_id = entry.id,
            received_at = %entry.received_at,
            "Processed inbound record"
        );
        self.queue.mark_processed(entry.id).await?;
        Ok(true)
    }

    async fn drain_batch(&self) -> Result<(u64, u64), QueueError> {
        let limit = self.batch_limit.load(Ordering::SeqCst);
        let mut processed = 0;
        let mut failed = 0;

        for _ in 0..limit {
            let Some(entry) = self.queue.next_pending().await? else {
                break;
            };
            if self.process_entry(&entry).await? {
                processed += 1;
            } else {
                failed += 1;
            }
        }

        Ok((processed, failed))
    }
}

#[async_trait]
impl Task for QueueProcessorTask {
    async fn initialize(&self, definition: TaskDefinition) {
        let limit = definition.u64_property(PROP_BATCH_LIMIT, DEFAULT_BATCH_LIMIT);
        self.batch_limit.store(limit, Ordering::SeqCst);
        self.state.set_definition(definition);
        info!(batch_limit = limit, "Queue processor initialized");
    }

    #[instrument(skip_all, fields(task = self.name()))]
    async fn execute(&self) {
        let _guard = self.state.start_executing();
        self.state.authenticate().await;

        match self.drain_batch().await {
            Ok((0, 0)) => debug!("Queue empty, nothing to process"),
            Ok((processed, failed)) => {
                info!(processed, failed, "Drained inbound record queue")
            }
            Err(e) => error!(error = %e, "Queue draining failed"),
        }
    }

    fn is_executing(&self) -> bool {
        self.state.is_executing()
    }

    fn definition(&self) -> Option<TaskDefinition> {
        self.state.definition()
    }

    async fn shutdown(&self) {
        self.state.clear();
    }

    fn name(&self) -> &str {
        "queue_processor"
    }
}

/// In-memory queue for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryRecordQueue {
    pending: parking_lot::Mutex<std::collections::VecDeque<QueueEntry>>,
    processed: parking_lot::Mutex<Vec<u64>>,
    failed: parking_lot::Mutex<Vec<(u64, String)>>,
}

impl MemoryRecordQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: QueueEntry) {
        self.pending.lock().push_back(entry);
    }

    pub fn processed_ids(&self) -> Vec<u64> {
        self.processed.lock().clone()
    }

    pub fn failed_ids(&self) -> Vec<u64> {
        self.failed.lock().iter().map(|(id, _)| *id).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

#[async_trait]
impl RecordQueue for MemoryRecordQueue {
    async fn next_pending(&self) -> Result<Option<QueueEntry>, QueueError> {
        Ok(self.pending.lock().pop_front())
    }

    async fn mark_processed(&self, entry_id: u64) -> Result<(), QueueError> {
        self.processed.lock().push(entry_id);
        Ok(())
    }

    async fn mark_failed(&self, entry_id: u64, reason: &str) -> Result<(), QueueError> {
        self.failed.lock().push((entry_id, reason.to_string()));
        Ok(())
    }
}
