//! Container registry endpoints. The account holds at most one registry.

use serde::{Deserialize, Serialize};

use crate::cloud::{ApiError, Registry, RegistryCredentials};

use super::DoClient;

#[derive(Serialize)]
struct CreateRegistryRequest<'a> {
    name: &'a str,
    subscription_tier_slug: &'a str,
}

#[derive(Deserialize)]
struct RegistryEnvelope {
    registry: RegistryDto,
}

#[derive(Deserialize)]
struct RegistryDto {
    #[serde(default)]
    name: String,
}

impl From<RegistryDto> for Registry {
    fn from(value: RegistryDto) -> Self {
        Self { name: value.name }
    }
}

impl DoClient {
    /// Fetches the account registry, mapping a 404 to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails for any reason other
    /// than the registry not existing.
    pub(in crate::digitalocean) async fn registry(&self) -> Result<Option<Registry>, ApiError> {
        let parsed: Option<RegistryEnvelope> =
            self.get("/registry").await?.success_or_none()?;
        Ok(parsed.map(|envelope| envelope.registry.into()))
    }

    /// Creates the account registry on the given subscription tier.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the provider rejects the request.
    pub(in crate::digitalocean) async fn add_registry(
        &self,
        name: &str,
        tier: &str,
    ) -> Result<Registry, ApiError> {
        let payload = CreateRegistryRequest {
            name,
            subscription_tier_slug: tier,
        };
        let parsed: RegistryEnvelope = self.post("/registry", &payload).await?.success()?;
        Ok(parsed.registry.into())
    }

    /// Mints docker credentials for the registry. The response body is a
    /// complete docker `config.json` and is passed through untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub(in crate::digitalocean) async fn docker_credentials(
        &self,
        read_write: bool,
    ) -> Result<RegistryCredentials, ApiError> {
        let path = format!("/registry/docker-credentials?read_write={read_write}");
        let body = self.get(&path).await?.text()?;
        Ok(RegistryCredentials {
            docker_config_json: body,
        })
    }
}
