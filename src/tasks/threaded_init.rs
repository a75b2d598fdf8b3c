//! Initialization barrier decorator.
//!
//! [`ThreadedInitWrapper`] decorates any [`Task`] so that its potentially slow
//! `initialize` runs on its own tokio task while `execute` suspends until that
//! initialization has signaled completion. Starting many tasks at boot then
//! costs the longest single setup rather than the sum of all of them, and a
//! trigger firing immediately after startup can never run a task whose setup
//! has not finished.

use crate::definition::TaskDefinition;
use crate::tasks::Task;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Decorates a task with an asynchronous initialization barrier.
///
/// The barrier value transitions `false -> true` exactly once per wrapper
/// instance and never reverts. Any `execute` call arriving before the
/// transition suspends until it occurs; a cancellation while suspended skips
/// that single run rather than retrying it.
pub struct ThreadedInitWrapper<T: Task + 'static> {
    inner: Arc<T>,
    initialized: watch::Sender<bool>,
    init_started: AtomicBool,
    cancel_token: CancellationToken,
}

/// Releases the barrier when dropped, so waiters are freed even if the inner
/// `initialize` panics. A task that failed to set up simply runs with
/// incomplete state and must report that from its own `execute`.
struct ReleaseBarrier(watch::Sender<bool>);

impl Drop for ReleaseBarrier {
    fn drop(&mut self) {
        let _ = self.0.send_replace(true);
    }
}

impl<T: Task + 'static> ThreadedInitWrapper<T> {
    pub fn new(inner: T) -> Self {
        Self::with_cancellation(inner, CancellationToken::new())
    }

    /// Wrap a task, tying barrier waits to the given token. Cancelling the
    /// token wakes any `execute` call suspended on the barrier and makes it
    /// skip its run.
    pub fn with_cancellation(inner: T, cancel_token: CancellationToken) -> Self {
        let (initialized, _) = watch::channel(false);
        Self {
            inner: Arc::new(inner),
            initialized,
            init_started: AtomicBool::new(false),
            cancel_token,
        }
    }

    /// Whether the wrapped task's initialization has completed.
    pub fn is_initialized(&self) -> bool {
        *self.initialized.borrow()
    }

    /// Wait out the barrier, then delegate one run to the wrapped task.
    ///
    /// Returns false when the wait was cancelled and the run was skipped
    /// without delegating; callers that track execution bookkeeping use this
    /// instead of the trait's `execute`.
    pub async fn run_if_initialized(&self) -> bool {
        if !self.wait_for_initialization().await {
            return false;
        }
        self.inner.execute().await;
        true
    }

    /// Suspend until the barrier opens. Returns false if the wait was
    /// cancelled and the run should be skipped.
    async fn wait_for_initialization(&self) -> bool {
        if self.is_initialized() {
            return true;
        }
        let mut initialized = self.initialized.subscribe();
        tokio::select! {
            result = initialized.wait_for(|ready| *ready) => {
                // The wrapper holds the sender, so the channel cannot close
                // while we are alive; treat closure as a skipped run anyway.
                if result.is_err() {
                    warn!(task = self.inner.name(), "Initialization barrier closed, skipping run");
                    return false;
                }
                true
            }
            () = self.cancel_token.cancelled() => {
                warn!(
                    task = self.inner.name(),
                    "Interrupted while waiting for initialization, skipping run"
                );
                false
            }
        }
    }
}

#[async_trait]
impl<T: Task + 'static> Task for ThreadedInitWrapper<T> {
    /// Start the wrapped task's real `initialize` on its own tokio task and
    /// return immediately. The barrier opens the moment that setup finishes.
    async fn initialize(&self, definition: TaskDefinition) {
        if self.init_started.swap(true, Ordering::SeqCst) {
            // Second call must not re-arm the barrier for callers that have
            // already passed it.
            warn!(
                task = self.inner.name(),
                "initialize called more than once, ignoring"
            );
            return;
        }

        let inner = Arc::clone(&self.inner);
        let release = ReleaseBarrier(self.initialized.clone());
        tokio::spawn(async move {
            let _release = release;
            debug!(task = inner.name(), "Task initialization starting");
            inner.initialize(definition).await;
            info!(task = inner.name(), "Task initialization complete");
        });
    }

    async fn execute(&self) {
        self.run_if_initialized().await;
    }

    fn is_executing(&self) -> bool {
        self.inner.is_executing()
    }

    fn definition(&self) -> Option<TaskDefinition> {
        self.inner.definition()
    }

    async fn shutdown(&self) {
        self.cancel_token.cancel();
        self.inner.shutdown().await;
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskState;
    use std::time::{Duration, Instant};
    use tokio::sync::Notify;

    /// Task whose initialize sleeps, then flips `ready`; execute records
    /// whether `ready` was set when its body ran.
    struct SlowInitTask {
        state: TaskState,
        init_delay: Duration,
        ready: AtomicBool,
        executed_before_ready: AtomicBool,
        executions: std::sync::atomic::AtomicU64,
    }

    impl SlowInitTask {
        fn new(init_delay: Duration) -> Self {
            Self {
                state: TaskState::new(),
                init_delay,
                ready: AtomicBool::new(false),
                executed_before_ready: AtomicBool::new(false),
                executions: std::sync::atomic::AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl Task for SlowInitTask {
        async fn initialize(&self, definition: TaskDefinition) {
            tokio::time::sleep(self.init_delay).await;
            self.state.set_definition(definition);
            self.ready.store(true, Ordering::SeqCst);
        }

        async fn execute(&self) {
            let _guard = self.state.start_executing();
            if !self.ready.load(Ordering::SeqCst) {
                self.executed_before_ready.store(true, Ordering::SeqCst);
            }
            self.executions.fetch_add(1, Ordering::SeqCst);
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
            "slow_init"
        }
    }

    fn definition() -> TaskDefinition {
        TaskDefinition::new("slow_init", "slow_init")
    }

    #[tokio::test]
    async fn test_execute_waits_for_initialization() {
        let wrapper = ThreadedInitWrapper::new(SlowInitTask::new(Duration::from_millis(200)));

        let started = Instant::now();
        wrapper.initialize(definition()).await;
        // initialize must return without having waited out the setup
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(!wrapper.is_initialized());

        wrapper.execute().await;
        // The immediate execute paid the full setup wait and the delegated
        // body only ran with setup complete.
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(wrapper.is_initialized());
        assert!(
            !wrapper
                .inner
                .executed_before_ready
                .load(Ordering::SeqCst)
        );
        assert_eq!(wrapper.inner.executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_initialize_does_not_rearm_barrier() {
        let wrapper = ThreadedInitWrapper::new(SlowInitTask::new(Duration::from_millis(10)));
        wrapper.initialize(definition()).await;
        wrapper.execute().await;
        assert!(wrapper.is_initialized());

        wrapper.initialize(definition()).await;
        assert!(wrapper.is_initialized());

        // Execute after the duplicate call proceeds without blocking
        tokio::time::timeout(Duration::from_millis(100), wrapper.execute())
            .await
            .expect("execute must not re-block after duplicate initialize");
        assert_eq!(wrapper.inner.executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_wait_skips_run() {
        let cancel_token = CancellationToken::new();
        let wrapper = Arc::new(ThreadedInitWrapper::with_cancellation(
            SlowInitTask::new(Duration::from_secs(30)),
            cancel_token.clone(),
        ));
        wrapper.initialize(definition()).await;

        let waiting = tokio::spawn({
            let wrapper = Arc::clone(&wrapper);
            async move { wrapper.run_if_initialized().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_token.cancel();

        let delegated = tokio::time::timeout(Duration::from_millis(500), waiting)
            .await
            .expect("cancelled waiter must return promptly")
            .unwrap();
        // The run was skipped, not executed with incomplete setup, and the
        // skip is reported so no execution gets recorded for it
        assert!(!delegated);
        assert_eq!(wrapper.inner.executions.load(Ordering::SeqCst), 0);
    }

    /// Task that panics during initialization.
    struct PanickingInitTask;

    #[async_trait]
    impl Task for PanickingInitTask {
        async fn initialize(&self, _definition: TaskDefinition) {
            panic!("setup exploded");
        }

        async fn execute(&self) {}

        fn is_executing(&self) -> bool {
            false
        }

        fn definition(&self) -> Option<TaskDefinition> {
            None
        }

        async fn shutdown(&self) {}

        fn name(&self) -> &str {
            "panicking_init"
        }
    }

    #[tokio::test]
    async fn test_barrier_released_when_initialization_panics() {
        let wrapper = ThreadedInitWrapper::new(PanickingInitTask);
        wrapper
            .initialize(TaskDefinition::new("panicking_init", "panicking_init"))
            .await;

        // Waiters must not be stuck forever behind a failed setup
        tokio::time::timeout(Duration::from_secs(1), wrapper.execute())
            .await
            .expect("barrier must open despite initialization panic");
        assert!(wrapper.is_initialized());
    }

    /// Task whose execute blocks on a signal, for observing is_executing
    /// from another tokio task mid-run.
    struct BlockingExecuteTask {
        state: TaskState,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Task for BlockingExecuteTask {
        async fn initialize(&self, definition: TaskDefinition) {
            self.state.set_definition(definition);
        }

        async fn execute(&self) {
            let _guard = self.state.start_executing();
            self.entered.notify_one();
            self.release.notified().await;
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
            "blocking_execute"
        }
    }

    #[tokio::test]
    async fn test_is_executing_observable_mid_run() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let wrapper = Arc::new(ThreadedInitWrapper::new(BlockingExecuteTask {
            state: TaskState::new(),
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        }));
        wrapper
            .initialize(TaskDefinition::new("blocking_execute", "blocking_execute"))
            .await;

        assert!(!wrapper.is_executing());

        let run = tokio::spawn({
            let wrapper = Arc::clone(&wrapper);
            async move { wrapper.execute().await }
        });

        entered.notified().await;
        assert!(wrapper.is_executing());

        release.notify_one();
        run.await.unwrap();
        assert!(!wrapper.is_executing());
    }

    #[tokio::test]
    async fn test_shutdown_clears_definition_and_unblocks_waiters() {
        let wrapper = Arc::new(ThreadedInitWrapper::new(SlowInitTask::new(
            Duration::from_secs(30),
        )));
        wrapper.initialize(definition()).await;

        let waiting = tokio::spawn({
            let wrapper = Arc::clone(&wrapper);
            async move { wrapper.execute().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        wrapper.shutdown().await;
        tokio::time::timeout(Duration::from_millis(500), waiting)
            .await
            .expect("shutdown must release barrier waiters")
            .unwrap();
        assert!(wrapper.definition().is_none());
    }
}
