//! Core library for the dockhand deployment tool.
//!
//! The crate converges a DigitalOcean account toward a fixed deployment
//! shape (VPC, firewall, container registry, droplet, and DNS records),
//! publishes a hardened n8n image, and then executes generated deployment
//! scripts on the droplet over SSH.

pub mod bootstrap;
pub mod cloud;
pub mod config;
pub mod deploy;
pub mod digitalocean;
pub mod dns;
pub mod image;
pub mod keymat;
pub mod reconcile;
pub mod remote;
pub mod runner;
pub mod scripts;
#[cfg(test)]
pub mod test_helpers;
pub mod test_support;

pub use bootstrap::{first_boot_script, user_bootstrap_script};
pub use cloud::{
    ApiError, ApiFuture, CloudApi, Domain, DomainRecord, DomainRecordRequest, Droplet,
    DropletRequest, Firewall, FirewallRequest, FirewallRule, Registry, RegistryCredentials, SshKey,
    Vpc, VpcRequest,
};
pub use config::{ConfigError, DeployConfig};
pub use deploy::{DeployError, Deployer, DeploymentOutcome};
pub use digitalocean::DoClient;
pub use dns::{DnsError, DnsWaiter, LookupError, LookupFuture, RecordLookup, SystemResolver};
pub use image::{ImageError, ImagePublisher, ImageRefs, ImageSpec};
pub use keymat::{KeyMaterialError, install_private_key, normalize_key_material};
pub use reconcile::{EnsuredDroplet, ReconcileError, Reconciler, record_name, root_domain};
pub use remote::{RemoteAuth, RemoteError, RemoteShell, RemoteTarget, Ssh2Shell};
pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner, SpawnError};
pub use scripts::{
    ScriptInputs, compose_manifest, deployment_script, env_file, generate_db_password,
    setup_commands,
};
