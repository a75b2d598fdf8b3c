//! Search index rebuild.
//!
//! Worker-per-invocation task: `execute` spawns a worker and returns once the
//! worker has started, because a full rebuild can take far longer than a
//! trigger firing should occupy. `is_executing` reflects the worker, and
//! `shutdown` sets a cooperative stop flag the worker polls between sections.
//!
//! The task does not enforce mutual exclusion between overlapping invocations;
//! the trigger interval is expected to exceed the rebuild duration, and an
//! overlap is logged as a warning.

use crate::definition::TaskDefinition;
use crate::errors::IndexError;
use crate::tasks::{Task, TaskState};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Search index maintained by the surrounding records system.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Names of the index sections to rebuild, in rebuild order.
    async fn sections(&self) -> Result<Vec<String>, IndexError>;

    /// Rebuild one section from the primary store.
    async fn rebuild_section(&self, section: &str) -> Result<(), IndexError>;
}

pub struct IndexRebuildTask {
    state: TaskState,
    index: Arc<dyn SearchIndex>,
    /// Set while a rebuild worker is live; cleared by the worker itself
    worker_running: Arc<AtomicBool>,
    /// Cooperative stop flag polled by the worker between sections
    stop_token: CancellationToken,
}

/// Clears the worker-running flag when the worker exits, on panic paths too.
struct WorkerGuard(Arc<AtomicBool>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl IndexRebuildTask {
    pub fn new(state: TaskState, index: Arc<dyn SearchIndex>) -> Self {
        Self {
            state,
            index,
            worker_running: Arc::new(AtomicBool::new(false)),
            stop_token: CancellationToken::new(),
        }
    }

    async fn rebuild(
        index: &dyn SearchIndex,
        stop_token: &CancellationToken,
    ) -> Result<(usize, usize), IndexError> {
        let sections = index.sections().await?;
        let total = sections.len();
        let mut rebuilt = 0;

        for section in sections {
            if stop_token.is_cancelled() {
                warn!(rebuilt, total, "Index rebuild stopped early by shutdown");
                break;
            }
            index.rebuild_section(&section).await?;
            rebuilt += 1;
        }

        Ok((rebuilt, total))
    }
}

#[async_trait]
impl Task for IndexRebuildTask {
    async fn initialize(&self, definition: TaskDefinition) {
        self.state.set_definition(definition);
    }

    /// Spawns the rebuild worker and returns once it has started.
    #[instrument(skip_all, fields(task = self.name()))]
    async fn execute(&self) {
        if self.worker_running.swap(true, Ordering::SeqCst) {
            warn!("Previous index rebuild still running, starting another worker");
        }

        let index = Arc::clone(&self.index);
        let stop_token = self.stop_token.clone();
        let guard = WorkerGuard(Arc::clone(&self.worker_running));

        tokio::spawn(async move {
            let _guard = guard;
            info!("Index rebuild worker started");
            match IndexRebuildTask::rebuild(index.as_ref(), &stop_token).await {
                Ok((rebuilt, total)) => {
                    info!(rebuilt, total, "Index rebuild worker finished")
                }
                Err(e) => error!(error = %e, "Index rebuild failed"),
            }
        });
    }

    /// Reflects the worker, not the (near-instant) `execute` call itself.
    fn is_executing(&self) -> bool {
        self.worker_running.load(Ordering::SeqCst)
    }

    fn definition(&self) -> Option<TaskDefinition> {
        self.state.definition()
    }

    async fn shutdown(&self) {
        self.stop_token.cancel();
        self.state.clear();
    }

    fn name(&self) -> &str {
        "index_rebuild"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    /// Index whose sections each take `section_delay` to rebuild.
    struct SlowIndex {
        section_count: usize,
        section_delay: Duration,
        rebuilt: AtomicUsize,
    }

    #[async_trait]
    impl SearchIndex for SlowIndex {
        async fn sections(&self) -> Result<Vec<String>, IndexError> {
            Ok((0..self.section_count)
                .map(|i| format!("section-{i}"))
                .collect())
        }

        async fn rebuild_section(&self, _section: &str) -> Result<(), IndexError> {
            tokio::time::sleep(self.section_delay).await;
            self.rebuilt.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn wait_until_idle(task: &IndexRebuildTask, deadline: Duration) {
        let started = Instant::now();
        while task.is_executing() {
            assert!(started.elapsed() < deadline, "worker never finished");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_execute_returns_while_worker_runs() {
        let index = Arc::new(SlowIndex {
            section_count: 4,
            section_delay: Duration::from_millis(50),
            rebuilt: AtomicUsize::new(0),
        });
        let task = IndexRebuildTask::new(TaskState::new(), Arc::clone(&index) as Arc<dyn SearchIndex>);
        task.initialize(TaskDefinition::new("index", "index_rebuild"))
            .await;

        let started = Instant::now();
        task.execute().await;
        // The call returned almost immediately...
        assert!(started.elapsed() < Duration::from_millis(50));
        // ...while the worker reports executing for roughly the work duration
        assert!(task.is_executing());

        wait_until_idle(&task, Duration::from_secs(5)).await;
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(index.rebuilt.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker_between_sections() {
        let index = Arc::new(SlowIndex {
            section_count: 100,
            section_delay: Duration::from_millis(20),
            rebuilt: AtomicUsize::new(0),
        });
        let task = IndexRebuildTask::new(TaskState::new(), Arc::clone(&index) as Arc<dyn SearchIndex>);
        task.initialize(TaskDefinition::new("index", "index_rebuild"))
            .await;

        task.execute().await;
        tokio::time::sleep(Duration::from_millis(70)).await;
        task.shutdown().await;

        wait_until_idle(&task, Duration::from_secs(5)).await;
        let rebuilt = index.rebuilt.load(Ordering::SeqCst);
        assert!(rebuilt > 0, "worker should have made progress");
        assert!(rebuilt < 100, "worker should have stopped early, got {rebuilt}");
        assert!(task.definition().is_none());
    }

    /// Index whose rebuild fails on the second section.
    struct FailingIndex;

    #[async_trait]
    impl SearchIndex for FailingIndex {
        async fn sections(&self) -> Result<Vec<String>, IndexError> {
            Ok(vec!["ok".to_string(), "broken".to_string()])
        }

        async fn rebuild_section(&self, section: &str) -> Result<(), IndexError> {
            if section == "broken" {
                return Err(IndexError::SectionRebuildFailed {
                    section: section.to_string(),
                    details: "store unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_rebuild_failure_clears_executing_flag() {
        let task = IndexRebuildTask::new(TaskState::new(), Arc::new(FailingIndex));
        task.initialize(TaskDefinition::new("index", "index_rebuild"))
            .await;

        task.execute().await;
        wait_until_idle(&task, Duration::from_secs(5)).await;
        assert!(!task.is_executing());
    }
}
