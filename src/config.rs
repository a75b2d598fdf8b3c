use crate::constants::{
    DEFAULT_CONNECTIVITY_TIMEOUT_MS, DEFAULT_SCHEDULER_PASSWORD, DEFAULT_SCHEDULER_USERNAME,
    DEFAULT_SHUTDOWN_GRACE_SECONDS, ENV_CONNECTIVITY_TIMEOUT_MS, ENV_SCHEDULER_PASSWORD,
    ENV_SCHEDULER_USERNAME, ENV_SHUTDOWN_GRACE_SECONDS,
};
use crate::errors::ConfigError;

type Result<T> = std::result::Result<T, ConfigError>;

/// Returns the crate version baked in at compile time.
pub fn version() -> Result<String> {
    option_env!("CARGO_PKG_VERSION")
        .map(str::to_string)
        .ok_or(ConfigError::VersionNotAvailable)
}

/// Scheduler service-account credentials.
///
/// Every task re-authenticates with these credentials before doing privileged
/// work, since tasks run outside any request context. The values are read-only
/// from the tasks' perspective.
#[derive(Clone)]
pub struct SchedulerCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SchedulerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the password
        f.debug_struct("SchedulerCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl SchedulerCredentials {
    pub fn new(username: String, password: String) -> Result<Self> {
        if username.is_empty() {
            return Err(ConfigError::InvalidCredential {
                details: "username must not be empty".to_string(),
            });
        }
        Ok(Self { username, password })
    }
}

impl Default for SchedulerCredentials {
    fn default() -> Self {
        Self {
            username: DEFAULT_SCHEDULER_USERNAME.to_string(),
            password: DEFAULT_SCHEDULER_PASSWORD.to_string(),
        }
    }
}

/// Grace period the scheduler waits for trigger loops to drain on shutdown.
#[derive(Clone, Debug)]
pub struct ShutdownGraceSeconds(u64);

impl Default for ShutdownGraceSeconds {
    fn default() -> Self {
        Self(DEFAULT_SHUTDOWN_GRACE_SECONDS)
    }
}

impl TryFrom<String> for ShutdownGraceSeconds {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        let seconds = value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidDuration {
                value: value.clone(),
            })?;
        Ok(Self(seconds))
    }
}

impl ShutdownGraceSeconds {
    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.0)
    }
}

/// Timeout for the connectivity probe request.
#[derive(Clone, Debug)]
pub struct ConnectivityTimeoutMs(u64);

impl Default for ConnectivityTimeoutMs {
    fn default() -> Self {
        Self(DEFAULT_CONNECTIVITY_TIMEOUT_MS)
    }
}

impl TryFrom<String> for ConnectivityTimeoutMs {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        let millis = value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidDuration {
                value: value.clone(),
            })?;
        if millis == 0 {
            return Err(ConfigError::InvalidDuration { value });
        }
        Ok(Self(millis))
    }
}

impl ConnectivityTimeoutMs {
    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0)
    }
}

/// Service configuration, loaded from environment variables.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub scheduler_credentials: SchedulerCredentials,
    pub shutdown_grace: ShutdownGraceSeconds,
    pub connectivity_timeout: ConnectivityTimeoutMs,
}

impl Config {
    pub fn new() -> Result<Self> {
        let username = std::env::var(ENV_SCHEDULER_USERNAME)
            .unwrap_or_else(|_| DEFAULT_SCHEDULER_USERNAME.to_string());
        let password = std::env::var(ENV_SCHEDULER_PASSWORD)
            .unwrap_or_else(|_| DEFAULT_SCHEDULER_PASSWORD.to_string());

        let shutdown_grace = match std::env::var(ENV_SHUTDOWN_GRACE_SECONDS) {
            Ok(value) => ShutdownGraceSeconds::try_from(value)?,
            Err(_) => ShutdownGraceSeconds::default(),
        };

        let connectivity_timeout = match std::env::var(ENV_CONNECTIVITY_TIMEOUT_MS) {
            Ok(value) => ConnectivityTimeoutMs::try_from(value)?,
            Err(_) => ConnectivityTimeoutMs::default(),
        };

        Ok(Self {
            scheduler_credentials: SchedulerCredentials::new(username, password)?,
            shutdown_grace,
            connectivity_timeout,
        })
    }
}
