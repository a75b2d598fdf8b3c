//! Task definition value type.
//!
//! A [`TaskDefinition`] identifies a task and carries its scheduling parameters
//! and a free-form string property bag. Definitions are owned by the external
//! task registry; once handed to `Task::initialize` the core treats them as
//! immutable values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Configuration record identifying a schedulable task.
///
/// Lifecycle: created and edited externally, passed once to `initialize`,
/// referenced read-only for the task's lifetime, cleared on `shutdown`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Unique task name
    pub name: String,

    /// Identifier of the implementing task type
    pub task_type: String,

    /// Optional human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Free-form string properties consumed by the task implementation
    #[serde(default)]
    pub properties: HashMap<String, String>,

    /// Seconds between firings; `0` means execute exactly once
    pub repeat_interval_secs: u64,

    /// Earliest firing time; `None` means fire immediately once scheduled
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    /// Whether the scheduler should start this task at system startup
    #[serde(default)]
    pub start_on_startup: bool,

    /// Whether the task is currently scheduled (maintained by the scheduler)
    #[serde(default)]
    pub started: bool,

    /// Completion time of the most recent firing (maintained by the scheduler)
    #[serde(default)]
    pub last_execution_time: Option<DateTime<Utc>>,
}

impl TaskDefinition {
    /// Create a definition with the given name and type and no properties.
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            description: None,
            properties: HashMap::new(),
            repeat_interval_secs: 0,
            start_time: None,
            start_on_startup: false,
            started: false,
            last_execution_time: None,
        }
    }

    /// Look up a string property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Look up a numeric property, falling back to `default` when the property
    /// is absent or unparsable. An unparsable value is logged, not an error:
    /// definitions are edited externally and a typo must not disable the task.
    pub fn u64_property(&self, key: &str, default: u64) -> u64 {
        match self.property(key) {
            None => default,
            Some(raw) => match raw.parse::<u64>() {
                Ok(value) => value,
                Err(_) => {
                    warn!(
                        task = %self.name,
                        property = key,
                        value = raw,
                        "Ignoring unparsable numeric task property"
                    );
                    default
                }
            },
        }
    }

    /// Firing period; `None` for single-execution tasks.
    pub fn repeat_interval(&self) -> Option<std::time::Duration> {
        if self.repeat_interval_secs == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.repeat_interval_secs))
        }
    }
}
