//! Outbound connectivity check.
//!
//! Stateless synchronous task: each firing issues one HTTP GET against a
//! configured probe URL and logs reachability and latency. Downstream
//! integrations (lab interfaces, terminology services) depend on outbound
//! connectivity, and a periodic probe surfaces outages in the logs before
//! users notice them.

use crate::constants::{DEFAULT_CHECK_URL, PROP_CHECK_URL};
use crate::definition::TaskDefinition;
use crate::tasks::{Task, TaskState};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

pub struct ConnectivityCheckTask {
    state: TaskState,
    client: reqwest::Client,
    timeout: Duration,
}

impl ConnectivityCheckTask {
    /// The probe timeout is fixed at construction; the probe URL comes from
    /// the definition's `check_url` property.
    pub fn new(state: TaskState, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Could not build probe client, falling back to default");
                reqwest::Client::new()
            }
        };
        // The timeout is also applied per request, so the fallback client
        // still probes with a bound
        Self {
            state,
            client,
            timeout,
        }
    }

    fn check_url(&self) -> String {
        self.state
            .definition()
            .as_ref()
            .and_then(|def| def.property(PROP_CHECK_URL).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_CHECK_URL.to_string())
    }
}

#[async_trait]
impl Task for ConnectivityCheckTask {
    async fn initialize(&self, definition: TaskDefinition) {
        self.state.set_definition(definition);
    }

    #[instrument(skip_all, fields(task = self.name()))]
    async fn execute(&self) {
        let _guard = self.state.start_executing();

        let url = self.check_url();
        let started = Instant::now();
        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => {
                info!(
                    url = %url,
                    status = response.status().as_u16(),
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Connectivity probe succeeded"
                );
            }
            Err(e) => {
                warn!(
                    url = %url,
                    latency_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Connectivity probe failed"
                );
            }
        }
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
        "connectivity_check"
    }
}
