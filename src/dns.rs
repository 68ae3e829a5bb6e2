//! DNS propagation waiter.
//!
//! After the zone record is reconciled, deployment must not proceed until
//! the public resolvers actually serve the droplet address, otherwise the
//! certificate handshake on first boot fails. The waiter polls a real
//! lookup rather than sleeping for a fixed grace period.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

const CHECK_INTERVAL: Duration = Duration::from_secs(10);
const PROPAGATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Future returned by record lookups.
pub type LookupFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Ipv4Addr>, LookupError>> + Send + 'a>>;

/// Error returned by a failed lookup. Resolution failures are expected
/// while a record propagates and are treated as "not yet".
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("lookup failed: {message}")]
pub struct LookupError {
    /// Underlying resolver message.
    pub message: String,
}

/// Resolves the A records of a fully qualified name.
pub trait RecordLookup: Send + Sync {
    /// Returns every IPv4 address currently served for `fqdn`.
    fn resolve_a<'a>(&'a self, fqdn: &'a str) -> LookupFuture<'a>;
}

/// Production lookup backed by the operating system resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl RecordLookup for SystemResolver {
    fn resolve_a<'a>(&'a self, fqdn: &'a str) -> LookupFuture<'a> {
        Box::pin(async move {
            let addresses =
                tokio::net::lookup_host((fqdn, 0))
                    .await
                    .map_err(|err| LookupError {
                        message: err.to_string(),
                    })?;
            Ok(addresses
                .filter_map(|addr| match addr.ip() {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                })
                .collect())
        })
    }
}

/// Errors raised while waiting for DNS convergence.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DnsError {
    /// Raised when the record did not propagate within the timeout.
    #[error("DNS record for {fqdn} did not propagate within {waited_secs}s")]
    PropagationTimeout {
        /// Name that was polled.
        fqdn: String,
        /// Seconds waited before giving up.
        waited_secs: u64,
    },
    /// Raised when the wait was cancelled.
    #[error("DNS wait for {fqdn} was cancelled")]
    Cancelled {
        /// Name that was being polled.
        fqdn: String,
    },
}

/// Polls a [`RecordLookup`] until a name resolves to an expected address.
pub struct DnsWaiter<L> {
    lookup: L,
    check_interval: Duration,
    timeout: Duration,
}

impl<L: RecordLookup> DnsWaiter<L> {
    /// Builds a waiter with the production intervals (10s checks, 5 minute
    /// timeout).
    #[must_use]
    pub const fn new(lookup: L) -> Self {
        Self {
            lookup,
            check_interval: CHECK_INTERVAL,
            timeout: PROPAGATION_TIMEOUT,
        }
    }

    /// Overrides the check interval and timeout. Primarily used by tests.
    #[must_use]
    pub const fn with_intervals(mut self, check_interval: Duration, timeout: Duration) -> Self {
        self.check_interval = check_interval;
        self.timeout = timeout;
        self
    }

    /// Waits until `fqdn` resolves to `expected`. The first check runs
    /// immediately; later checks are spaced by the check interval.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::PropagationTimeout`] when the deadline passes and
    /// [`DnsError::Cancelled`] when `cancel` fires.
    pub async fn wait_for_record(
        &self,
        fqdn: &str,
        expected: Ipv4Addr,
        cancel: &CancellationToken,
    ) -> Result<(), DnsError> {
        let deadline = Instant::now() + self.timeout;

        while Instant::now() <= deadline {
            if cancel.is_cancelled() {
                return Err(DnsError::Cancelled {
                    fqdn: fqdn.to_owned(),
                });
            }

            match self.lookup.resolve_a(fqdn).await {
                Ok(addresses) if addresses.contains(&expected) => {
                    tracing::info!(fqdn, address = %expected, "DNS record propagated");
                    return Ok(());
                }
                Ok(addresses) => {
                    tracing::debug!(fqdn, observed = ?addresses, "record not yet propagated");
                }
                Err(err) => {
                    tracing::debug!(fqdn, error = %err, "lookup failed, retrying");
                }
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(DnsError::Cancelled {
                        fqdn: fqdn.to_owned(),
                    });
                }
                () = sleep(self.check_interval) => {}
            }
        }

        Err(DnsError::PropagationTimeout {
            fqdn: fqdn.to_owned(),
            waited_secs: self.timeout.as_secs(),
        })
    }
}
