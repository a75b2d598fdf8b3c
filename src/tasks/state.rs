//! Shared lifecycle bookkeeping for task implementations.
//!
//! Concrete tasks embed a [`TaskState`] instead of inheriting base behavior:
//! it owns the stored definition, the executing flag, and the authentication
//! helper that concrete tasks call at the top of `execute`.

use crate::context::{ServiceContext, Session};
use crate::definition::TaskDefinition;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Common runtime state embedded by concrete tasks.
pub struct TaskState {
    definition: RwLock<Option<TaskDefinition>>,
    executing: AtomicBool,
    session: RwLock<Option<Session>>,
    context: Option<Arc<ServiceContext>>,
}

impl TaskState {
    /// State for a task that performs no privileged work.
    pub fn new() -> Self {
        Self {
            definition: RwLock::new(None),
            executing: AtomicBool::new(false),
            session: RwLock::new(None),
            context: None,
        }
    }

    /// State for a task that authenticates with the scheduler service account.
    pub fn with_context(context: Arc<ServiceContext>) -> Self {
        Self {
            context: Some(context),
            ..Self::new()
        }
    }

    /// Mark the task executing for the lifetime of the returned guard.
    ///
    /// The flag is cleared when the guard drops, so it cannot stay set across
    /// an early return or a panic inside `execute`.
    pub fn start_executing(&self) -> ExecutionGuard<'_> {
        self.executing.store(true, Ordering::SeqCst);
        ExecutionGuard { state: self }
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    pub fn set_definition(&self, definition: TaskDefinition) {
        *self.definition.write() = Some(definition);
    }

    pub fn definition(&self) -> Option<TaskDefinition> {
        self.definition.read().clone()
    }

    /// Clear the stored definition and session on shutdown.
    pub fn clear(&self) {
        *self.definition.write() = None;
        *self.session.write() = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    /// Establish an authenticated session if one is not already held.
    ///
    /// Authentication failure is logged by the context and leaves the task
    /// unauthenticated; callers must expect privileged work to fail downstream.
    pub async fn authenticate(&self) {
        if self.is_authenticated() {
            return;
        }
        let Some(context) = &self.context else {
            debug!("Task has no service context, skipping authentication");
            return;
        };
        if let Some(session) = context.open_session().await {
            *self.session.write() = Some(session);
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard bracketing one `execute` run.
pub struct ExecutionGuard<'a> {
    state: &'a TaskState,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.state.executing.store(false, Ordering::SeqCst);
    }
}
