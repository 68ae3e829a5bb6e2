//! Idempotent convergence of cloud resources toward the deployment's
//! desired state.
//!
//! Every `ensure_*` operation follows the same shape: list (or get) the
//! current inventory, match by the deterministic resource name, and return
//! the existing resource or create the missing one. Re-running against
//! converged infrastructure performs no writes, with one exception: the
//! firewall rule set is re-asserted on every run.

use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;

mod droplet;
mod keys;
mod network;
mod record;
mod registry;

pub use record::{record_name, root_domain};

use crate::cloud::{ApiError, CloudApi, Droplet};

const DEFAULT_REGION: &str = "nyc1";
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);
const SSH_SETTLE_DELAY: Duration = Duration::from_secs(30);
const ACTIVE_TIMEOUT: Duration = Duration::from_secs(600);
const REGISTRY_RETRY_DELAY: Duration = Duration::from_secs(5);
const REGISTRY_RETRY_BUDGET: u32 = 3;

/// Raised when a reconcile operation fails.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Raised when a cloud API call fails.
    #[error("{operation} failed: {source}")]
    Api {
        /// Operation that was being performed.
        operation: &'static str,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },
    /// Raised when the public key cannot be read for registration.
    #[error("failed to read public key {path}: {message}")]
    PublicKey {
        /// Path that could not be read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the registry exists but reports no name.
    #[error("registry reported an empty name")]
    RegistryEmpty,
    /// Raised when the registry never became ready within the retry budget.
    #[error("registry {name} not ready after {attempts} attempts")]
    RegistryNotReady {
        /// Registry name that was being waited on.
        name: String,
        /// Number of readiness attempts made.
        attempts: u32,
    },
    /// Raised when the droplet never reached `active` within the timeout.
    #[error("droplet {name} did not become active in time")]
    ActiveTimeout {
        /// Droplet that was being waited on.
        name: String,
    },
    /// Raised when a droplet reports no public IPv4 address.
    #[error("droplet {name} has no public IPv4 address")]
    MissingPublicIp {
        /// Droplet missing its address.
        name: String,
    },
    /// Raised when reconciliation is cancelled while waiting on the droplet.
    #[error("reconciliation of droplet {name} was cancelled")]
    Cancelled {
        /// Droplet that was being waited on.
        name: String,
    },
}

/// Droplet convergence outcome. `created` distinguishes a fresh droplet,
/// which still needs one-time bootstrap, from an adopted one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnsuredDroplet {
    /// The converged droplet.
    pub droplet: Droplet,
    /// Public IPv4 address of the droplet.
    pub address: Ipv4Addr,
    /// Whether this run created the droplet.
    pub created: bool,
}

/// Converges cloud resources toward the deployment's desired state.
#[derive(Clone, Debug)]
pub struct Reconciler<A> {
    api: A,
    status_poll_interval: Duration,
    ssh_settle_delay: Duration,
    active_timeout: Duration,
    registry_retry_delay: Duration,
    registry_retry_budget: u32,
}

impl<A: CloudApi> Reconciler<A> {
    /// Creates a reconciler with production timings.
    #[must_use]
    pub const fn new(api: A) -> Self {
        Self {
            api,
            status_poll_interval: STATUS_POLL_INTERVAL,
            ssh_settle_delay: SSH_SETTLE_DELAY,
            active_timeout: ACTIVE_TIMEOUT,
            registry_retry_delay: REGISTRY_RETRY_DELAY,
            registry_retry_budget: REGISTRY_RETRY_BUDGET,
        }
    }

    /// Overrides the droplet status polling interval.
    ///
    /// This is primarily used by tests to keep wait scenarios fast.
    #[must_use]
    pub const fn with_status_poll_interval(mut self, interval: Duration) -> Self {
        self.status_poll_interval = interval;
        self
    }

    /// Overrides the post-activation SSH settle delay.
    ///
    /// This is primarily used by tests to keep wait scenarios fast.
    #[must_use]
    pub const fn with_ssh_settle_delay(mut self, delay: Duration) -> Self {
        self.ssh_settle_delay = delay;
        self
    }

    /// Overrides the droplet activation timeout.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_active_timeout(mut self, timeout: Duration) -> Self {
        self.active_timeout = timeout;
        self
    }

    /// Overrides the registry readiness retry delay.
    ///
    /// This is primarily used by tests to keep retry scenarios fast.
    #[must_use]
    pub const fn with_registry_retry_delay(mut self, delay: Duration) -> Self {
        self.registry_retry_delay = delay;
        self
    }

    /// Returns the underlying cloud API client.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }
}

const fn api_error(operation: &'static str, source: ApiError) -> ReconcileError {
    ReconcileError::Api { operation, source }
}

#[cfg(test)]
mod tests;
