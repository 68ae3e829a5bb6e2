//! Provider abstraction for the cloud resources a deployment needs.
//!
//! [`CloudApi`] covers the list/get/create/update surface the reconciler
//! drives. The production implementation lives in [`crate::digitalocean`];
//! tests substitute scripted fakes.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

mod types;

pub use types::{
    DomainRecordRequest, DropletRequest, FirewallRequest, FirewallRule, VpcRequest,
};
pub use types::{Domain, DomainRecord, Droplet, Firewall, Registry, RegistryCredentials, SshKey, Vpc};

/// Errors raised by cloud API implementations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// Raised when the request never produced an HTTP response.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying error message.
        message: String,
    },
    /// Raised when the provider answered with a non-success status.
    #[error("HTTP status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, preserved for diagnosis.
        body: String,
    },
    /// Raised when a success response could not be decoded.
    #[error("invalid response body: {message}")]
    Decode {
        /// Underlying error message.
        message: String,
    },
}

/// Future returned by cloud API operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Interface the reconciler drives. Get-style lookups return `Ok(None)` on a
/// 404-equivalent so callers can distinguish "needs creation" from failure.
pub trait CloudApi: Send + Sync {
    /// Lists the SSH keys registered with the account.
    fn list_ssh_keys(&self) -> ApiFuture<'_, Vec<SshKey>>;

    /// Registers a public key with the account.
    fn create_ssh_key<'a>(&'a self, name: &'a str, public_key: &'a str)
    -> ApiFuture<'a, SshKey>;

    /// Lists the account's VPC networks.
    fn list_vpcs(&self) -> ApiFuture<'_, Vec<Vpc>>;

    /// Creates a VPC network.
    fn create_vpc<'a>(&'a self, request: &'a VpcRequest) -> ApiFuture<'a, Vpc>;

    /// Lists the account's firewalls.
    fn list_firewalls(&self) -> ApiFuture<'_, Vec<Firewall>>;

    /// Creates a firewall with the requested rule set.
    fn create_firewall<'a>(&'a self, request: &'a FirewallRequest) -> ApiFuture<'a, Firewall>;

    /// Replaces an existing firewall's rule set.
    fn update_firewall<'a>(
        &'a self,
        id: &'a str,
        request: &'a FirewallRequest,
    ) -> ApiFuture<'a, Firewall>;

    /// Fetches the account registry, or `None` when no registry exists.
    fn get_registry(&self) -> ApiFuture<'_, Option<Registry>>;

    /// Creates the account registry.
    fn create_registry<'a>(&'a self, name: &'a str, tier: &'a str) -> ApiFuture<'a, Registry>;

    /// Mints docker credentials for the account registry.
    fn registry_credentials(&self, read_write: bool) -> ApiFuture<'_, RegistryCredentials>;

    /// Fetches a DNS zone by name, or `None` when the zone does not exist.
    fn get_domain<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Domain>>;

    /// Creates a DNS zone.
    fn create_domain<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Domain>;

    /// Lists the records of a DNS zone.
    fn list_domain_records<'a>(&'a self, domain: &'a str) -> ApiFuture<'a, Vec<DomainRecord>>;

    /// Creates a record in a DNS zone.
    fn create_domain_record<'a>(
        &'a self,
        domain: &'a str,
        request: &'a DomainRecordRequest,
    ) -> ApiFuture<'a, DomainRecord>;

    /// Updates an existing record in a DNS zone.
    fn update_domain_record<'a>(
        &'a self,
        domain: &'a str,
        record_id: u64,
        request: &'a DomainRecordRequest,
    ) -> ApiFuture<'a, DomainRecord>;

    /// Lists the account's droplets.
    fn list_droplets(&self) -> ApiFuture<'_, Vec<Droplet>>;

    /// Fetches a droplet by identifier.
    fn get_droplet(&self, id: u64) -> ApiFuture<'_, Droplet>;

    /// Creates a droplet.
    fn create_droplet<'a>(&'a self, request: &'a DropletRequest) -> ApiFuture<'a, Droplet>;
}
