//! Background task contract and implementations.
//!
//! This module is the heart of the scheduler core: the [`Task`] trait every
//! schedulable unit of work implements, the shared lifecycle bookkeeping in
//! [`TaskState`], the initialization barrier in [`ThreadedInitWrapper`], and
//! the concrete tasks shipped with the service.
//!
//! # Architecture
//!
//! A task moves through a simple lifecycle driven entirely by the scheduler:
//! `initialize(definition)` exactly once, then `execute()` on every scheduled
//! firing, with `is_executing()` available for monitoring and `shutdown()` to
//! retire the task. None of the four methods may propagate an error the
//! scheduler cannot ignore; tasks log their own failures.
//!
//! Initialization can be slow (opening processors, warming caches), so the
//! scheduler wraps every task in [`ThreadedInitWrapper`]: `initialize` returns
//! immediately while the real setup runs on its own tokio task, and any
//! `execute` arriving early suspends on the barrier until setup completes.
//! Starting N tasks at boot therefore costs the longest single setup, not the
//! sum of all of them.
//!
//! # Execution styles
//!
//! Two styles of concrete task are supported:
//!
//! - **Synchronous**: `execute()` does the work on the calling (trigger) task
//!   and returns when done ([`QueueProcessorTask`], [`ConnectivityCheckTask`]).
//! - **Worker-per-invocation**: `execute()` spawns a worker and returns once it
//!   has started; `is_executing()` reflects the worker, and `shutdown()` sets a
//!   cooperative stop flag the worker polls ([`IndexRebuildTask`]).

pub mod connectivity;
pub mod index_rebuild;
pub mod queue_processor;
pub mod state;
pub mod threaded_init;

pub use connectivity::ConnectivityCheckTask;
pub use index_rebuild::{IndexRebuildTask, SearchIndex};
pub use queue_processor::{MemoryRecordQueue, QueueEntry, QueueProcessorTask, RecordQueue};
pub use state::{ExecutionGuard, TaskState};
pub use threaded_init::ThreadedInitWrapper;

use crate::definition::TaskDefinition;
use async_trait::async_trait;
use std::sync::Arc;

/// A unit of schedulable background work.
///
/// Implementations share state through interior mutability ([`TaskState`]
/// carries the common pieces), so every method takes `&self` and instances can
/// be driven from the scheduler behind an `Arc<dyn Task>`.
#[async_trait]
pub trait Task: Send + Sync {
    /// Store the configuration and perform any expensive setup.
    ///
    /// Called exactly once per task instance, before any `execute`. Failures
    /// must be logged rather than propagated; the scheduler has no recovery
    /// path for a task that cannot set itself up other than disabling it.
    async fn initialize(&self, definition: TaskDefinition);

    /// Perform one unit of scheduled work.
    ///
    /// Implementations catch and log internal failures so a bad run cannot
    /// corrupt scheduler state for other tasks or future firings.
    async fn execute(&self);

    /// Whether a call to `execute` is currently in flight on this instance.
    fn is_executing(&self) -> bool;

    /// The stored definition; `None` before `initialize` and after `shutdown`.
    fn definition(&self) -> Option<TaskDefinition>;

    /// Release resources and clear the definition.
    ///
    /// Cooperative and non-blocking: safe to call while `execute` is
    /// mid-flight, and never forcibly interrupts a run.
    async fn shutdown(&self);

    /// Human-readable task name for logs.
    fn name(&self) -> &str;
}

// The scheduler hands tasks around as `Arc<dyn Task>`; delegating through the
// Arc lets those handles be wrapped and driven like any concrete task.
#[async_trait]
impl<T: Task + ?Sized> Task for Arc<T> {
    async fn initialize(&self, definition: TaskDefinition) {
        self.as_ref().initialize(definition).await
    }

    async fn execute(&self) {
        self.as_ref().execute().await
    }

    fn is_executing(&self) -> bool {
        self.as_ref().is_executing()
    }

    fn definition(&self) -> Option<TaskDefinition> {
        self.as_ref().definition()
    }

    async fn shutdown(&self) {
        self.as_ref().shutdown().await
    }

    fn name(&self) -> &str {
        self.as_ref().name()
    }
}
