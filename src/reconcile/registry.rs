//! Container registry reconciliation.

use tokio::time::sleep;

use super::{ReconcileError, Reconciler, api_error};
use crate::cloud::{CloudApi, Registry};

const REGISTRY_NAME: &str = "n8n";
const REGISTRY_TIER: &str = "starter";

impl<A: CloudApi> Reconciler<A> {
    /// Ensures the account registry exists and is ready.
    ///
    /// A missing registry is created as `n8n` on the starter tier. The
    /// registry is then polled until it reports a non-empty name; API
    /// errors during readiness polling count as failed attempts rather
    /// than aborting.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when the lookup or creation fails, the
    /// registry reports an empty name, or the retry budget is exhausted.
    pub async fn ensure_registry(&self) -> Result<Registry, ReconcileError> {
        let current = self
            .api()
            .get_registry()
            .await
            .map_err(|err| api_error("get registry", err))?;
        match current {
            Some(registry) if registry.name.is_empty() => {
                return Err(ReconcileError::RegistryEmpty);
            }
            Some(registry) => {
                tracing::debug!(name = %registry.name, "registry already exists");
            }
            None => {
                tracing::info!(name = REGISTRY_NAME, "creating registry");
                let created = self
                    .api()
                    .create_registry(REGISTRY_NAME, REGISTRY_TIER)
                    .await
                    .map_err(|err| api_error("create registry", err))?;
                if created.name.is_empty() {
                    return Err(ReconcileError::RegistryEmpty);
                }
            }
        }

        self.wait_for_registry_ready().await
    }

    async fn wait_for_registry_ready(&self) -> Result<Registry, ReconcileError> {
        for attempt in 0..self.registry_retry_budget {
            if let Ok(Some(registry)) = self.api().get_registry().await
                && !registry.name.is_empty()
            {
                return Ok(registry);
            }
            tracing::debug!(attempt, "registry not ready yet");
            sleep(self.registry_retry_delay).await;
        }

        Err(ReconcileError::RegistryNotReady {
            name: String::from(REGISTRY_NAME),
            attempts: self.registry_retry_budget,
        })
    }
}
