//! End-to-end deployment orchestration.
//!
//! A deployment is a fixed linear sequence: converge the cloud resources,
//! bootstrap a freshly created droplet, converge DNS, publish the image,
//! then execute the rendered deployment script on the droplet. Every step
//! either adopts what already exists or creates what is missing, so the
//! recovery path for any mid-run failure is simply another run.

use std::net::{IpAddr, Ipv4Addr};

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::bootstrap;
use crate::cloud::{ApiError, CloudApi, Registry};
use crate::config::DeployConfig;
use crate::dns::{DnsError, DnsWaiter, RecordLookup};
use crate::image::{ImageError, ImagePublisher, ImageRefs, ImageSpec};
use crate::reconcile::{ReconcileError, Reconciler};
use crate::remote::{RemoteError, RemoteShell, RemoteTarget};
use crate::runner::CommandRunner;
use crate::scripts::{self, ScriptInputs};

#[cfg(test)]
mod tests;

/// Raised when a deployment run fails.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Raised when converging a cloud resource fails.
    #[error("converging the {step} failed: {source}")]
    Converge {
        /// Resource the failing step was converging.
        step: &'static str,
        /// Underlying reconciliation failure.
        #[source]
        source: ReconcileError,
    },
    /// Raised when the one-time bootstrap of a fresh droplet fails.
    #[error("droplet bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying remote execution failure.
        #[source]
        source: RemoteError,
    },
    /// Raised when the deployment record never becomes resolvable.
    #[error("DNS convergence failed: {source}")]
    Dns {
        /// Underlying propagation failure.
        #[source]
        source: DnsError,
    },
    /// Raised when minting registry credentials fails.
    #[error("minting registry credentials failed: {source}")]
    Credentials {
        /// Underlying API failure.
        #[source]
        source: ApiError,
    },
    /// Raised when building or pushing the image fails.
    #[error("publishing the image failed: {source}")]
    Publish {
        /// Underlying build or push failure.
        #[source]
        source: ImageError,
    },
    /// Raised when executing the deployment script on the droplet fails.
    #[error("running the deployment script failed: {source}")]
    Execute {
        /// Underlying remote execution failure.
        #[source]
        source: RemoteError,
    },
}

/// Summary of a finished deployment run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeploymentOutcome {
    /// Public IPv4 address of the droplet serving the stack.
    pub droplet_ip: Ipv4Addr,
    /// References the image was published under.
    pub image: ImageRefs,
    /// URL the instance answers on once certificates are issued.
    pub url: String,
}

/// Drives one deployment from cloud resources to a running stack.
pub struct Deployer<A, L, R, S> {
    config: DeployConfig,
    reconciler: Reconciler<A>,
    dns: DnsWaiter<L>,
    publisher: ImagePublisher<R>,
    shell: S,
}

impl<A, L, R, S> Deployer<A, L, R, S>
where
    A: CloudApi,
    L: RecordLookup,
    R: CommandRunner,
    S: RemoteShell,
{
    /// Builds a deployer over the given components.
    #[must_use]
    pub const fn new(
        config: DeployConfig,
        reconciler: Reconciler<A>,
        dns: DnsWaiter<L>,
        publisher: ImagePublisher<R>,
        shell: S,
    ) -> Self {
        Self {
            config,
            reconciler,
            dns,
            publisher,
            shell,
        }
    }

    /// Runs the deployment end to end and reports where the stack is
    /// reachable. A droplet that already existed is adopted without being
    /// bootstrapped again; the image build and the deployment script run on
    /// every invocation.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError`] identifying the failing step. `cancel` stops
    /// the droplet activation wait and the DNS wait at the next poll.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<DeploymentOutcome, DeployError> {
        tracing::info!(
            droplet = %self.config.droplet_name,
            domain = %self.config.domain,
            "starting deployment"
        );

        let key = self
            .reconciler
            .ensure_ssh_key(
                &self.config.ssh_key_fingerprint,
                &self.config.droplet_name,
                &self.config.resolved_ssh_key_path(),
            )
            .await
            .map_err(|source| converge("SSH key", source))?;
        let vpc = self
            .reconciler
            .ensure_vpc(&self.config.droplet_name)
            .await
            .map_err(|source| converge("VPC", source))?;
        self.reconciler
            .ensure_firewall(&self.config.droplet_name)
            .await
            .map_err(|source| converge("firewall", source))?;
        let registry = self
            .reconciler
            .ensure_registry()
            .await
            .map_err(|source| converge("registry", source))?;
        self.reconciler
            .ensure_domain(&self.config.domain)
            .await
            .map_err(|source| converge("domain", source))?;

        let user_data = bootstrap::first_boot_script(&self.config.domain);
        let droplet = self
            .reconciler
            .ensure_droplet(
                &self.config.droplet_name,
                key.id,
                &vpc.id,
                &user_data,
                cancel,
            )
            .await
            .map_err(|source| converge("droplet", source))?;
        if droplet.created {
            tracing::info!(address = %droplet.address, "bootstrapping fresh droplet");
            self.run_as_root(droplet.address, bootstrap::user_bootstrap_script())
                .map_err(|source| DeployError::Bootstrap { source })?;
        }

        self.reconciler
            .ensure_dns_record(&self.config.domain, droplet.address)
            .await
            .map_err(|source| converge("DNS record", source))?;
        self.dns
            .wait_for_record(&self.config.domain, droplet.address, cancel)
            .await
            .map_err(|source| DeployError::Dns { source })?;

        let image = self.publish_image(&registry).await?;
        self.execute_deployment(droplet.address, &image)?;

        let outcome = DeploymentOutcome {
            droplet_ip: droplet.address,
            image,
            url: format!("https://{}", self.config.domain),
        };
        tracing::info!(url = %outcome.url, "deployment complete");
        Ok(outcome)
    }

    /// Mints fresh read-write credentials, then builds and pushes the image
    /// under a floating and an immutable reference.
    async fn publish_image(&self, registry: &Registry) -> Result<ImageRefs, DeployError> {
        let credentials = self
            .reconciler
            .api()
            .registry_credentials(true)
            .await
            .map_err(|source| DeployError::Credentials { source })?;
        let now = Utc::now();
        let refs = ImageRefs::for_publication(
            &self.config.registry_url,
            &registry.name,
            &self.config.n8n_version,
            now,
        );
        let spec = ImageSpec {
            base_version: self.config.n8n_version.clone(),
            created: now,
            encryption_key: self.config.encryption_key.clone(),
            basic_auth_user: self.config.basic_auth_user.clone(),
            basic_auth_pass: self.config.basic_auth_pass.clone(),
        };
        self.publisher
            .publish(&spec, &refs, &credentials)
            .map_err(|source| DeployError::Publish { source })?;
        Ok(refs)
    }

    /// Renders the deployment script from the configuration and the
    /// published image, then executes it on the droplet.
    fn execute_deployment(&self, address: Ipv4Addr, image: &ImageRefs) -> Result<(), DeployError> {
        let inputs = ScriptInputs {
            domain: self.config.domain.clone(),
            image: image.latest.clone(),
            registry_host: self.config.registry_url.clone(),
            registry_token: self.config.api_token.clone(),
            encryption_key: self.config.encryption_key.clone(),
            basic_auth_user: self.config.basic_auth_user.clone(),
            basic_auth_pass: self.config.basic_auth_pass.clone(),
            db_password: scripts::generate_db_password(),
            email_mode: self.config.email_mode_or_default(),
        };
        tracing::info!(%address, image = %inputs.image, "executing deployment script");
        self.run_as_root(address, &scripts::deployment_script(&inputs))
            .map_err(|source| DeployError::Execute { source })?;
        Ok(())
    }

    fn run_as_root(&self, address: Ipv4Addr, script: &str) -> Result<String, RemoteError> {
        let target = RemoteTarget::new(IpAddr::V4(address), "root");
        self.shell.run_script(&target, script)
    }
}

const fn converge(step: &'static str, source: ReconcileError) -> DeployError {
    DeployError::Converge { step, source }
}
