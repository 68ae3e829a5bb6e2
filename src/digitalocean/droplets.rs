//! Droplet endpoints.

use serde::{Deserialize, Serialize};

use crate::cloud::{ApiError, Droplet, DropletRequest};

use super::{DoClient, PAGE_SIZE};

#[derive(Serialize)]
struct CreateDropletPayload<'a> {
    name: &'a str,
    region: &'a str,
    size: &'a str,
    image: &'a str,
    ssh_keys: [u64; 1],
    vpc_uuid: &'a str,
    tags: &'a [String],
    monitoring: bool,
    ipv6: bool,
    backups: bool,
    user_data: &'a str,
}

#[derive(Deserialize)]
struct DropletListResponse {
    droplets: Vec<DropletDto>,
}

#[derive(Deserialize)]
struct DropletEnvelope {
    droplet: DropletDto,
}

#[derive(Deserialize)]
struct DropletDto {
    id: u64,
    name: String,
    status: String,
    #[serde(default)]
    networks: NetworksDto,
}

#[derive(Default, Deserialize)]
struct NetworksDto {
    #[serde(default)]
    v4: Vec<NetworkV4Dto>,
}

#[derive(Deserialize)]
struct NetworkV4Dto {
    ip_address: String,
    #[serde(rename = "type")]
    kind: String,
}

impl From<DropletDto> for Droplet {
    fn from(value: DropletDto) -> Self {
        let public_ipv4 = value
            .networks
            .v4
            .iter()
            .find(|network| network.kind == "public")
            .and_then(|network| network.ip_address.parse().ok());
        Self {
            id: value.id,
            name: value.name,
            status: value.status,
            public_ipv4,
        }
    }
}

impl DoClient {
    /// Lists the account's droplets.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub(in crate::digitalocean) async fn droplets(&self) -> Result<Vec<Droplet>, ApiError> {
        let path = format!("/droplets?per_page={PAGE_SIZE}");
        let parsed: DropletListResponse = self.get(&path).await?.success()?;
        Ok(parsed.droplets.into_iter().map(Droplet::from).collect())
    }

    /// Fetches droplet `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails or the droplet does not
    /// exist.
    pub(in crate::digitalocean) async fn droplet(&self, id: u64) -> Result<Droplet, ApiError> {
        let path = format!("/droplets/{id}");
        let parsed: DropletEnvelope = self.get(&path).await?.success()?;
        Ok(parsed.droplet.into())
    }

    /// Creates a droplet.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the provider rejects the request.
    pub(in crate::digitalocean) async fn add_droplet(
        &self,
        request: &DropletRequest,
    ) -> Result<Droplet, ApiError> {
        let payload = CreateDropletPayload {
            name: &request.name,
            region: &request.region,
            size: &request.size,
            image: &request.image,
            ssh_keys: [request.ssh_key_id],
            vpc_uuid: &request.vpc_id,
            tags: &request.tags,
            monitoring: request.monitoring,
            ipv6: request.ipv6,
            backups: request.backups,
            user_data: &request.user_data,
        };
        let parsed: DropletEnvelope = self.post("/droplets", &payload).await?.success()?;
        Ok(parsed.droplet.into())
    }
}
