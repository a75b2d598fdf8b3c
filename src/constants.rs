//! Application-wide constants

/// Environment variables read by [`crate::config::Config`]
pub(crate) const ENV_SCHEDULER_USERNAME: &str = "CLINSCHED_SCHEDULER_USERNAME";
pub(crate) const ENV_SCHEDULER_PASSWORD: &str = "CLINSCHED_SCHEDULER_PASSWORD";
pub(crate) const ENV_SHUTDOWN_GRACE_SECONDS: &str = "CLINSCHED_SHUTDOWN_GRACE_SECONDS";
pub(crate) const ENV_CONNECTIVITY_TIMEOUT_MS: &str = "CLINSCHED_CONNECTIVITY_TIMEOUT_MS";

/// Default service-account credentials used when none are configured.
/// These match the install-time defaults of the surrounding records system.
pub(crate) const DEFAULT_SCHEDULER_USERNAME: &str = "admin";
pub(crate) const DEFAULT_SCHEDULER_PASSWORD: &str = "test";

/// Task definition property keys
pub const PROP_BATCH_LIMIT: &str = "batch_limit";
pub const PROP_CHECK_URL: &str = "check_url";

/// Default number of queue entries drained per queue-processor firing
pub const DEFAULT_BATCH_LIMIT: u64 = 25;

/// Default probe target for the connectivity check task
pub const DEFAULT_CHECK_URL: &str = "https://www.google.com";

/// Default timeout for the connectivity probe request
pub(crate) const DEFAULT_CONNECTIVITY_TIMEOUT_MS: u64 = 10_000;

/// Default grace period the scheduler waits for trigger loops on shutdown
pub(crate) const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 30;
