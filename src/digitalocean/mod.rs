//! DigitalOcean implementation of the cloud control plane.
//!
//! Endpoint groups live in submodules, each owning the serde envelopes for
//! its slice of the v2 REST API and mapping them onto the plain resource
//! model in [`crate::cloud`]. Failure bodies are preserved verbatim so API
//! rejections stay diagnosable from logs.

mod domains;
mod droplets;
mod keys;
mod network;
mod registry;

use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cloud::{
    ApiError, ApiFuture, CloudApi, Domain, DomainRecord, DomainRecordRequest, Droplet,
    DropletRequest, Firewall, FirewallRequest, Registry, RegistryCredentials, SshKey, Vpc,
    VpcRequest,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const DO_API_BASE: &str = "https://api.digitalocean.com/v2";
const PAGE_SIZE: u32 = 200;

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Client for the DigitalOcean v2 REST API.
#[derive(Clone)]
pub struct DoClient {
    token: String,
    base_url: String,
}

impl DoClient {
    /// Constructs a client authenticating with `token`.
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_owned(),
            base_url: String::from(DO_API_BASE),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        let request = HTTP_CLIENT.get(self.url(path)).bearer_auth(&self.token);
        Self::dispatch(request).await
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        let request = HTTP_CLIENT
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body);
        Self::dispatch(request).await
    }

    async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        let request = HTTP_CLIENT
            .put(self.url(path))
            .bearer_auth(&self.token)
            .json(body);
        Self::dispatch(request).await
    }

    async fn dispatch(request: reqwest::RequestBuilder) -> Result<ApiResponse, ApiError> {
        let response = request.send().await.map_err(|err| ApiError::Transport {
            message: err.to_string(),
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|err| ApiError::Transport {
            message: err.to_string(),
        })?;
        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Buffered response shared by the endpoint modules.
struct ApiResponse {
    status: u16,
    body: Vec<u8>,
}

impl ApiResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes a success body, or preserves the failure body in the error.
    fn success<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        if !self.is_success() {
            return Err(self.into_status_error());
        }
        serde_json::from_slice(&self.body).map_err(|err| ApiError::Decode {
            message: err.to_string(),
        })
    }

    /// Like [`Self::success`], but maps a 404 to `None`.
    fn success_or_none<T: DeserializeOwned>(self) -> Result<Option<T>, ApiError> {
        if self.status == 404 {
            return Ok(None);
        }
        self.success().map(Some)
    }

    /// Returns the success body as text without decoding it.
    fn text(self) -> Result<String, ApiError> {
        if !self.is_success() {
            return Err(self.into_status_error());
        }
        Ok(String::from_utf8_lossy(&self.body).into_owned())
    }

    fn into_status_error(self) -> ApiError {
        ApiError::Status {
            status: self.status,
            body: String::from_utf8_lossy(&self.body).into_owned(),
        }
    }
}

impl CloudApi for DoClient {
    fn list_ssh_keys(&self) -> ApiFuture<'_, Vec<SshKey>> {
        Box::pin(self.account_keys())
    }

    fn create_ssh_key<'a>(
        &'a self,
        name: &'a str,
        public_key: &'a str,
    ) -> ApiFuture<'a, SshKey> {
        Box::pin(self.add_account_key(name, public_key))
    }

    fn list_vpcs(&self) -> ApiFuture<'_, Vec<Vpc>> {
        Box::pin(self.vpcs())
    }

    fn create_vpc<'a>(&'a self, request: &'a VpcRequest) -> ApiFuture<'a, Vpc> {
        Box::pin(self.add_vpc(request))
    }

    fn list_firewalls(&self) -> ApiFuture<'_, Vec<Firewall>> {
        Box::pin(self.firewalls())
    }

    fn create_firewall<'a>(&'a self, request: &'a FirewallRequest) -> ApiFuture<'a, Firewall> {
        Box::pin(self.add_firewall(request))
    }

    fn update_firewall<'a>(
        &'a self,
        id: &'a str,
        request: &'a FirewallRequest,
    ) -> ApiFuture<'a, Firewall> {
        Box::pin(self.replace_firewall(id, request))
    }

    fn get_registry(&self) -> ApiFuture<'_, Option<Registry>> {
        Box::pin(self.registry())
    }

    fn create_registry<'a>(&'a self, name: &'a str, tier: &'a str) -> ApiFuture<'a, Registry> {
        Box::pin(self.add_registry(name, tier))
    }

    fn registry_credentials(&self, read_write: bool) -> ApiFuture<'_, RegistryCredentials> {
        Box::pin(self.docker_credentials(read_write))
    }

    fn get_domain<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Domain>> {
        Box::pin(self.domain(name))
    }

    fn create_domain<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Domain> {
        Box::pin(self.add_domain(name))
    }

    fn list_domain_records<'a>(&'a self, domain: &'a str) -> ApiFuture<'a, Vec<DomainRecord>> {
        Box::pin(self.domain_records(domain))
    }

    fn create_domain_record<'a>(
        &'a self,
        domain: &'a str,
        request: &'a DomainRecordRequest,
    ) -> ApiFuture<'a, DomainRecord> {
        Box::pin(self.add_domain_record(domain, request))
    }

    fn update_domain_record<'a>(
        &'a self,
        domain: &'a str,
        record_id: u64,
        request: &'a DomainRecordRequest,
    ) -> ApiFuture<'a, DomainRecord> {
        Box::pin(self.replace_domain_record(domain, record_id, request))
    }

    fn list_droplets(&self) -> ApiFuture<'_, Vec<Droplet>> {
        Box::pin(self.droplets())
    }

    fn get_droplet(&self, id: u64) -> ApiFuture<'_, Droplet> {
        Box::pin(self.droplet(id))
    }

    fn create_droplet<'a>(&'a self, request: &'a DropletRequest) -> ApiFuture<'a, Droplet> {
        Box::pin(self.add_droplet(request))
    }
}
