//! Task registry abstraction.
//!
//! The registry is the external configuration store that owns
//! [`TaskDefinition`] records. The scheduler core only reads definitions and
//! writes back two pieces of bookkeeping: the started flag and the last
//! execution time. Persistence is out of scope here; [`MemoryTaskRegistry`]
//! backs tests and single-process deployments.

use crate::definition::TaskDefinition;
use crate::errors::RegistryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[async_trait]
pub trait TaskRegistry: Send + Sync {
    /// Fetch one definition by task name.
    async fn get_definition(&self, name: &str) -> RegistryResult<Option<TaskDefinition>>;

    /// List every registered definition.
    async fn list_definitions(&self) -> RegistryResult<Vec<TaskDefinition>>;

    /// Create or replace a definition.
    async fn save_definition(&self, definition: TaskDefinition) -> RegistryResult<()>;

    /// Remove a definition.
    async fn delete_definition(&self, name: &str) -> RegistryResult<()>;

    /// Record whether the named task is currently scheduled.
    async fn set_started(&self, name: &str, started: bool) -> RegistryResult<()>;

    /// Record the completion time of a firing.
    async fn record_execution(&self, name: &str, at: DateTime<Utc>) -> RegistryResult<()>;
}

/// In-memory registry keyed by task name.
#[derive(Default)]
pub struct MemoryTaskRegistry {
    definitions: RwLock<HashMap<String, TaskDefinition>>,
}

impl MemoryTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, name: &str, apply: F) -> RegistryResult<()>
    where
        F: FnOnce(&mut TaskDefinition),
    {
        let mut definitions = self.definitions.write();
        match definitions.get_mut(name) {
            Some(definition) => {
                apply(definition);
                Ok(())
            }
            None => Err(RegistryError::DefinitionNotFound {
                name: name.to_string(),
            }),
        }
    }
}

#[async_trait]
impl TaskRegistry for MemoryTaskRegistry {
    async fn get_definition(&self, name: &str) -> RegistryResult<Option<TaskDefinition>> {
        Ok(self.definitions.read().get(name).cloned())
    }

    async fn list_definitions(&self) -> RegistryResult<Vec<TaskDefinition>> {
        let mut definitions: Vec<TaskDefinition> =
            self.definitions.read().values().cloned().collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(definitions)
    }

    async fn save_definition(&self, definition: TaskDefinition) -> RegistryResult<()> {
        if definition.name.is_empty() {
            return Err(RegistryError::InvalidDefinition {
                name: definition.name.clone(),
                details: "name must not be empty".to_string(),
            });
        }
        self.definitions
            .write()
            .insert(definition.name.clone(), definition);
        Ok(())
    }

    async fn delete_definition(&self, name: &str) -> RegistryResult<()> {
        self.definitions.write().remove(name);
        Ok(())
    }

    async fn set_started(&self, name: &str, started: bool) -> RegistryResult<()> {
        self.update(name, |definition| definition.started = started)
    }

    async fn record_execution(&self, name: &str, at: DateTime<Utc>) -> RegistryResult<()> {
        self.update(name, |definition| {
            definition.last_execution_time = Some(at)
        })
    }
}
