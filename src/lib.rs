//! # clinsched
//!
//! clinsched is the background task scheduler core of a clinical-records
//! service. It runs independently-defined units of work (queue processors,
//! connectivity checks, index rebuilds) on their own tokio tasks, with the
//! guarantees the surrounding system depends on:
//!
//! - a task's `execute()` never runs before its potentially slow
//!   `initialize()` has completed, without blocking the rest of startup;
//! - a failing run (including a panic) is isolated from the scheduler and
//!   from every other task;
//! - each task re-establishes an authenticated execution context, since
//!   tasks run outside any request context;
//! - any individual task can be stopped and restarted without restarting
//!   the process.
//!
//! ## Architecture Overview
//!
//! ### Task contract
//! - The [`tasks::Task`] trait is the unit of schedulable work:
//!   `initialize` / `execute` / `is_executing` / `shutdown`
//! - [`tasks::TaskState`] carries the shared lifecycle bookkeeping concrete
//!   tasks embed (definition storage, executing flag, authentication helper)
//!
//! ### Initialization barrier
//! - [`tasks::ThreadedInitWrapper`] decorates any task so its real
//!   `initialize` runs concurrently with system startup while `execute`
//!   suspends until setup has signaled completion
//!
//! ### Trigger service
//! - [`scheduler::SchedulerService`] owns one trigger loop per scheduled
//!   task: start-time delay, then one-shot or fixed-interval firing, each
//!   firing isolated on its own tokio task
//!
//! ## Configuration
//!
//! The service is configured via environment variables:
//! - `CLINSCHED_SCHEDULER_USERNAME` / `CLINSCHED_SCHEDULER_PASSWORD`:
//!   service-account credentials tasks authenticate with
//! - `CLINSCHED_SHUTDOWN_GRACE_SECONDS`: how long shutdown waits for
//!   trigger loops to drain
//! - `CLINSCHED_CONNECTIVITY_TIMEOUT_MS`: probe timeout for the
//!   connectivity check task
//!
//! ## Error Handling
//!
//! All error strings use the format: `error-clinsched-<domain>-<number> <message>`

/// Configuration management for the scheduler service.
///
/// Environment-variable loading for the scheduler service account and
/// operational timeouts.
pub mod config;

pub(crate) mod constants;

/// Authenticated execution context for task work.
///
/// Explicit per-task context objects replace any process-wide "current user":
/// each task opens its own session with the scheduler service account.
pub mod context;

/// Task definition value type and property accessors.
pub mod definition;

pub mod errors;

/// Task registry abstraction over the external definition store.
pub mod registry;

/// Trigger service owning the timers that fire scheduled tasks.
pub mod scheduler;

/// Background task contract and implementations.
///
/// The [`tasks::Task`] trait, shared lifecycle state, the threaded
/// initialization wrapper, and the concrete tasks shipped with the service.
pub mod tasks;

#[cfg(test)]
pub mod test_helpers;
