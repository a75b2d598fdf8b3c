//! Trigger service: owns the timers that fire scheduled tasks.
//!
//! [`SchedulerService`] turns registered [`TaskDefinition`]s into running
//! trigger loops. Every scheduled task is wrapped in a
//! [`ThreadedInitWrapper`], so slow setup never blocks scheduling, and every
//! firing runs on its own tokio task so a panicking run is isolated from the
//! trigger loop and from other tasks. Individual tasks can be stopped and
//! restarted without restarting the process.
//!
//! Firing is plain interval scheduling: an optional `start_time` delay, then
//! one execution per `repeat_interval_secs` (`0` means execute exactly once).
//! Cron-style schedule computation belongs to a different layer.

use crate::definition::TaskDefinition;
use crate::errors::RegistryError;
use crate::registry::TaskRegistry;
use crate::tasks::{Task, ThreadedInitWrapper};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, instrument, warn};

/// Scheduler errors following the error-clinsched-<domain>-<number> format
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("error-clinsched-scheduler-1 Task already scheduled: {name}")]
    AlreadyScheduled { name: String },

    #[error("error-clinsched-scheduler-2 Task not scheduled: {name}")]
    NotScheduled { name: String },

    #[error("error-clinsched-scheduler-3 No task definition registered: {name}")]
    UnknownDefinition { name: String },

    #[error("error-clinsched-scheduler-4 No factory registered for task type: {task_type}")]
    UnknownTaskType { task_type: String },

    #[error("error-clinsched-scheduler-5 Registry operation failed: {0}")]
    Registry(#[from] RegistryError),
}

/// Builds a fresh task instance for a task type.
///
/// Stopping a task retires its instance for good (the initialization barrier
/// is deliberately one-shot), so restarting always goes through the factory.
pub type TaskFactory = Arc<dyn Fn() -> Arc<dyn Task> + Send + Sync>;

// The scheduler always wraps scheduled tasks, and keeps the concrete wrapper
// type so firings can distinguish a delegated run from a skipped one.
type WrappedTask = ThreadedInitWrapper<Arc<dyn Task>>;

struct ScheduledHandle {
    task: Arc<WrappedTask>,
    cancel: CancellationToken,
    /// Trigger loop handle; `None` only while `schedule_task` is mid-flight.
    join: Option<JoinHandle<()>>,
}

/// Owns the trigger loops for all scheduled tasks.
pub struct SchedulerService {
    registry: Arc<dyn TaskRegistry>,
    factories: Mutex<HashMap<String, TaskFactory>>,
    scheduled: Mutex<HashMap<String, ScheduledHandle>>,
    tracker: TaskTracker,
    shutdown_token: CancellationToken,
    shutdown_grace: Duration,
}

impl SchedulerService {
    pub fn new(registry: Arc<dyn TaskRegistry>, shutdown_grace: Duration) -> Self {
        Self {
            registry,
            factories: Mutex::new(HashMap::new()),
            scheduled: Mutex::new(HashMap::new()),
            tracker: TaskTracker::new(),
            shutdown_token: CancellationToken::new(),
            shutdown_grace,
        }
    }

    /// Register the factory that builds task instances for a task type.
    pub fn register_factory(&self, task_type: impl Into<String>, factory: TaskFactory) {
        self.factories.lock().insert(task_type.into(), factory);
    }

    /// Schedule a task according to its definition.
    ///
    /// The definition is upserted into the registry with its started flag set,
    /// the task instance is wrapped so its initialization runs on its own
    /// tokio task, and a trigger loop is spawned. Returns as soon as the loop
    /// is running; initialization may still be in progress.
    pub async fn schedule_task(&self, definition: TaskDefinition) -> Result<(), SchedulerError> {
        let name = definition.name.clone();

        let factory = self
            .factories
            .lock()
            .get(&definition.task_type)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownTaskType {
                task_type: definition.task_type.clone(),
            })?;

        let cancel = self.shutdown_token.child_token();
        let task = Arc::new(ThreadedInitWrapper::with_cancellation(
            factory(),
            cancel.clone(),
        ));

        // Never start the same task twice; a second schedule entry needs its
        // own definition. The name is reserved before the first await so two
        // concurrent calls cannot both pass this check.
        {
            let mut scheduled = self.scheduled.lock();
            if scheduled.contains_key(&name) {
                return Err(SchedulerError::AlreadyScheduled { name });
            }
            scheduled.insert(
                name.clone(),
                ScheduledHandle {
                    task: Arc::clone(&task),
                    cancel: cancel.clone(),
                    join: None,
                },
            );
        }

        let mut stored = definition.clone();
        stored.started = true;
        if let Err(e) = self.registry.save_definition(stored).await {
            self.scheduled.lock().remove(&name);
            return Err(e.into());
        }

        // Non-blocking: spawns the real initialization and returns
        task.initialize(definition.clone()).await;

        info!(
            task = %name,
            task_type = %definition.task_type,
            repeat_interval_secs = definition.repeat_interval_secs,
            "Task scheduled"
        );

        let registry = Arc::clone(&self.registry);
        let join = self
            .tracker
            .spawn(trigger_loop(Arc::clone(&task), definition, registry, cancel));
        if let Some(handle) = self.scheduled.lock().get_mut(&name) {
            handle.join = Some(join);
        }
        Ok(())
    }

    /// Stop a single task without touching the rest of the scheduler.
    ///
    /// Cancels the task's trigger loop; a run blocked on the initialization
    /// barrier wakes and is skipped. Waits for the loop to retire the task,
    /// so by the time this returns the registry bookkeeping for the stopped
    /// instance has landed and cannot clobber a later reschedule.
    pub async fn stop_task(&self, name: &str) -> Result<(), SchedulerError> {
        let handle = self
            .scheduled
            .lock()
            .remove(name)
            .ok_or_else(|| SchedulerError::NotScheduled {
                name: name.to_string(),
            })?;
        handle.cancel.cancel();
        if let Some(join) = handle.join {
            let _ = join.await;
        }
        info!(task = %name, "Task stopped");
        Ok(())
    }

    /// Stop a task and schedule a fresh instance from the registry's current
    /// definition.
    pub async fn restart_task(&self, name: &str) -> Result<(), SchedulerError> {
        if let Err(e) = self.stop_task(name).await {
            debug!(task = %name, error = %e, "Restart of a task that was not running");
        }

        let definition = self
            .registry
            .get_definition(name)
            .await?
            .ok_or_else(|| SchedulerError::UnknownDefinition {
                name: name.to_string(),
            })?;
        self.schedule_task(definition).await
    }

    /// Schedule every registered definition flagged to start on startup.
    ///
    /// A definition that fails to schedule is logged and skipped; one bad
    /// task must not keep the rest of the system from starting.
    #[instrument(skip_all)]
    pub async fn startup(&self) -> Result<(), SchedulerError> {
        debug!("Starting scheduler service");
        for definition in self.registry.list_definitions().await? {
            if !definition.start_on_startup {
                continue;
            }
            let name = definition.name.clone();
            if let Err(e) = self.schedule_task(definition).await {
                error!(task = %name, error = %e, "Could not schedule task at startup");
            }
        }
        Ok(())
    }

    /// Stop all tasks and wait for their trigger loops to drain.
    #[instrument(skip_all)]
    pub async fn shutdown(&self) {
        debug!("Gracefully shutting down scheduler service");
        self.shutdown_token.cancel();
        self.scheduled.lock().clear();

        self.tracker.close();
        if tokio::time::timeout(self.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                grace_secs = self.shutdown_grace.as_secs(),
                "Trigger loops did not drain within the shutdown grace period"
            );
        }
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.scheduled.lock().contains_key(name)
    }

    /// Whether the named task currently reports an execution in flight.
    /// `None` when the task is not scheduled.
    pub fn is_task_executing(&self, name: &str) -> Option<bool> {
        self.scheduled
            .lock()
            .get(name)
            .map(|handle| handle.task.is_executing())
    }

    pub fn scheduled_task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scheduled.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

/// One trigger loop per scheduled task: optional start delay, then one-shot
/// or fixed-interval firing until cancelled.
async fn trigger_loop(
    task: Arc<WrappedTask>,
    definition: TaskDefinition,
    registry: Arc<dyn TaskRegistry>,
    cancel: CancellationToken,
) {
    let name = definition.name.clone();

    if let Some(start_time) = definition.start_time {
        let delay = (start_time - Utc::now()).to_std().unwrap_or_default();
        if !delay.is_zero() {
            tokio::select! {
                () = cancel.cancelled() => {
                    retire(&task, &registry, &name).await;
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    match definition.repeat_interval() {
        None => {
            // Single execution
            if !cancel.is_cancelled() {
                fire(&task, &registry, &name).await;
            }
        }
        Some(period) => {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => fire(&task, &registry, &name).await,
                }
            }
        }
    }

    retire(&task, &registry, &name).await;
}

/// Run one firing on its own tokio task so a panic inside `execute` cannot
/// take down the trigger loop or any other task.
///
/// The execution time is recorded only when the run actually delegated to
/// the task (including runs that then panicked), never for a run skipped at
/// the initialization barrier or aborted before delegation.
async fn fire(task: &Arc<WrappedTask>, registry: &Arc<dyn TaskRegistry>, name: &str) {
    let run = Arc::clone(task);
    let executed = match tokio::spawn(async move { run.run_if_initialized().await }).await {
        Ok(executed) => {
            if !executed {
                debug!(task = %name, "Run skipped before initialization completed");
            }
            executed
        }
        Err(e) if e.is_panic() => {
            error!(task = %name, "Task run panicked; scheduler continues");
            true
        }
        Err(_) => {
            debug!(task = %name, "Task run aborted");
            false
        }
    };

    if !executed {
        return;
    }
    if let Err(e) = registry.record_execution(name, Utc::now()).await {
        warn!(task = %name, error = %e, "Could not record task execution time");
    }
}

async fn retire(task: &Arc<WrappedTask>, registry: &Arc<dyn TaskRegistry>, name: &str) {
    task.shutdown().await;
    if let Err(e) = registry.set_started(name, false).await {
        warn!(task = %name, error = %e, "Could not clear started flag");
    }
    info!(task = %name, "Trigger loop exited");
}
