use anyhow::Result;
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::prelude::*;

use clinsched::config::Config;
use clinsched::context::{ServiceContext, StaticAuthService};
use clinsched::definition::TaskDefinition;
use clinsched::registry::{MemoryTaskRegistry, TaskRegistry};
use clinsched::scheduler::SchedulerService;
use clinsched::tasks::{
    ConnectivityCheckTask, IndexRebuildTask, MemoryRecordQueue, QueueProcessorTask, RecordQueue,
    SearchIndex, Task, TaskState,
};

/// Index over the demo deployment's searchable record types.
struct DemoSearchIndex;

#[async_trait::async_trait]
impl SearchIndex for DemoSearchIndex {
    async fn sections(&self) -> Result<Vec<String>, clinsched::errors::IndexError> {
        Ok(["patients", "encounters", "observations", "orders"]
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    async fn rebuild_section(&self, section: &str) -> Result<(), clinsched::errors::IndexError> {
        tracing::debug!(section, "Rebuilding index section");
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let version = clinsched::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    let config = Config::new()?;

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "clinsched=info".into()),
    );

    // Configure output format based on environment
    let fmt_layer = if std::env::var("JSON_LOGS").is_ok() {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!(version = %version, "Starting clinsched scheduler service");

    // The authentication service and registry are provided by the records
    // system in a full deployment; this binary wires up the in-process ones.
    let context = Arc::new(ServiceContext::new(
        Arc::new(StaticAuthService::new(
            config.scheduler_credentials.username.clone(),
            config.scheduler_credentials.password.clone(),
        )),
        config.scheduler_credentials.clone(),
    ));

    let registry = Arc::new(MemoryTaskRegistry::new());
    seed_definitions(registry.as_ref()).await?;

    let scheduler = Arc::new(SchedulerService::new(
        Arc::clone(&registry) as Arc<dyn TaskRegistry>,
        config.shutdown_grace.as_duration(),
    ));

    let queue = Arc::new(MemoryRecordQueue::new());
    let queue_context = Arc::clone(&context);
    scheduler.register_factory("queue_processor", {
        let queue = Arc::clone(&queue);
        Arc::new(move || {
            Arc::new(QueueProcessorTask::new(
                TaskState::with_context(Arc::clone(&queue_context)),
                Arc::clone(&queue) as Arc<dyn RecordQueue>,
            )) as Arc<dyn Task>
        })
    });

    let probe_timeout = config.connectivity_timeout.as_duration();
    scheduler.register_factory(
        "connectivity_check",
        Arc::new(move || {
            Arc::new(ConnectivityCheckTask::new(TaskState::new(), probe_timeout))
                as Arc<dyn Task>
        }),
    );

    let index_context = Arc::clone(&context);
    scheduler.register_factory(
        "index_rebuild",
        Arc::new(move || {
            Arc::new(IndexRebuildTask::new(
                TaskState::with_context(Arc::clone(&index_context)),
                Arc::new(DemoSearchIndex),
            )) as Arc<dyn Task>
        }),
    );

    scheduler.startup().await?;
    tracing::info!(
        tasks = ?scheduler.scheduled_task_names(),
        "Scheduler started"
    );

    signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    scheduler.shutdown().await;
    tracing::info!("Scheduler stopped");
    Ok(())
}

/// Register the stock task definitions a fresh install ships with.
async fn seed_definitions(registry: &MemoryTaskRegistry) -> Result<()> {
    let mut queue = TaskDefinition::new("inbound-record-queue", "queue_processor");
    queue.description = Some("Drain the inbound clinical record queue".to_string());
    queue.repeat_interval_secs = 30;
    queue.start_on_startup = true;

    let mut connectivity = TaskDefinition::new("connectivity-check", "connectivity_check");
    connectivity.description = Some("Probe outbound connectivity".to_string());
    connectivity.repeat_interval_secs = 300;
    connectivity.start_on_startup = true;

    let mut index = TaskDefinition::new("search-index-rebuild", "index_rebuild");
    index.description = Some("Rebuild the record search index".to_string());
    index.repeat_interval_secs = 3600;
    index.start_on_startup = false;

    for definition in [queue, connectivity, index] {
        registry.save_definition(definition).await?;
    }
    Ok(())
}
