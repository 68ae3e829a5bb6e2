//! Account SSH key endpoints.

use serde::{Deserialize, Serialize};

use crate::cloud::{ApiError, SshKey};

use super::{DoClient, PAGE_SIZE};

#[derive(Serialize)]
struct CreateKeyRequest<'a> {
    name: &'a str,
    public_key: &'a str,
}

#[derive(Deserialize)]
struct KeyListResponse {
    ssh_keys: Vec<KeyDto>,
}

#[derive(Deserialize)]
struct KeyEnvelope {
    ssh_key: KeyDto,
}

#[derive(Deserialize)]
struct KeyDto {
    id: u64,
    fingerprint: String,
    name: String,
}

impl From<KeyDto> for SshKey {
    fn from(value: KeyDto) -> Self {
        Self {
            id: value.id,
            fingerprint: value.fingerprint,
            name: value.name,
        }
    }
}

impl DoClient {
    /// Lists every SSH key registered with the account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails or the body cannot be
    /// decoded.
    pub(in crate::digitalocean) async fn account_keys(&self) -> Result<Vec<SshKey>, ApiError> {
        let path = format!("/account/keys?per_page={PAGE_SIZE}");
        let parsed: KeyListResponse = self.get(&path).await?.success()?;
        Ok(parsed.ssh_keys.into_iter().map(SshKey::from).collect())
    }

    /// Registers `public_key` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the provider rejects the key.
    pub(in crate::digitalocean) async fn add_account_key(
        &self,
        name: &str,
        public_key: &str,
    ) -> Result<SshKey, ApiError> {
        let payload = CreateKeyRequest { name, public_key };
        let parsed: KeyEnvelope = self.post("/account/keys", &payload).await?.success()?;
        Ok(parsed.ssh_key.into())
    }
}
