//! Droplet reconciliation: adopt by name, or create and wait for activation.

use std::net::Ipv4Addr;
use std::time::Instant;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::{DEFAULT_REGION, EnsuredDroplet, ReconcileError, Reconciler, api_error};
use crate::cloud::{CloudApi, Droplet, DropletRequest};

const DROPLET_SIZE: &str = "s-2vcpu-2gb";
const DROPLET_IMAGE: &str = "docker-20-04";

impl<A: CloudApi> Reconciler<A> {
    /// Adopts the droplet matching `name`, or creates it and waits for
    /// activation.
    ///
    /// A freshly created droplet is polled until the provider reports
    /// `active`, then allowed a fixed settle delay so SSH comes up before
    /// anyone connects. The outcome records whether this run created the
    /// droplet so one-time bootstrap only happens for new droplets. Both
    /// waits honour `cancel`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when an API call fails, the droplet never
    /// becomes active, it reports no public address, or the wait is
    /// cancelled.
    pub async fn ensure_droplet(
        &self,
        name: &str,
        ssh_key_id: u64,
        vpc_id: &str,
        user_data: &str,
        cancel: &CancellationToken,
    ) -> Result<EnsuredDroplet, ReconcileError> {
        let droplets = self
            .api()
            .list_droplets()
            .await
            .map_err(|err| api_error("list droplets", err))?;
        if let Some(existing) = droplets.into_iter().find(|droplet| droplet.name == name) {
            tracing::info!(id = existing.id, "adopting existing droplet");
            let address = public_address(&existing)?;
            return Ok(EnsuredDroplet {
                droplet: existing,
                address,
                created: false,
            });
        }

        let request = DropletRequest {
            name: name.to_owned(),
            region: String::from(DEFAULT_REGION),
            size: String::from(DROPLET_SIZE),
            image: String::from(DROPLET_IMAGE),
            ssh_key_id,
            vpc_id: vpc_id.to_owned(),
            tags: vec![String::from("n8n"), String::from("production")],
            monitoring: true,
            ipv6: true,
            backups: true,
            user_data: user_data.to_owned(),
        };
        tracing::info!(%name, size = DROPLET_SIZE, region = DEFAULT_REGION, "creating droplet");
        let created = self
            .api()
            .create_droplet(&request)
            .await
            .map_err(|err| api_error("create droplet", err))?;

        let active = self.wait_for_active(created.id, name, cancel).await?;
        let address = public_address(&active)?;

        tracing::info!(%address, delay = ?self.ssh_settle_delay, "droplet active, settling before ssh");
        tokio::select! {
            () = cancel.cancelled() => {
                return Err(ReconcileError::Cancelled {
                    name: name.to_owned(),
                });
            }
            () = sleep(self.ssh_settle_delay) => {}
        }

        Ok(EnsuredDroplet {
            droplet: active,
            address,
            created: true,
        })
    }

    async fn wait_for_active(
        &self,
        id: u64,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Droplet, ReconcileError> {
        let deadline = Instant::now() + self.active_timeout;
        while Instant::now() <= deadline {
            if cancel.is_cancelled() {
                return Err(ReconcileError::Cancelled {
                    name: name.to_owned(),
                });
            }

            let droplet = self
                .api()
                .get_droplet(id)
                .await
                .map_err(|err| api_error("get droplet", err))?;
            if droplet.status == "active" {
                return Ok(droplet);
            }

            tracing::debug!(status = %droplet.status, "droplet not active yet");
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(ReconcileError::Cancelled {
                        name: name.to_owned(),
                    });
                }
                () = sleep(self.status_poll_interval) => {}
            }
        }

        Err(ReconcileError::ActiveTimeout {
            name: name.to_owned(),
        })
    }
}

fn public_address(droplet: &Droplet) -> Result<Ipv4Addr, ReconcileError> {
    droplet
        .public_ipv4
        .ok_or_else(|| ReconcileError::MissingPublicIp {
            name: droplet.name.clone(),
        })
}
