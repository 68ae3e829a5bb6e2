//! VPC and firewall reconciliation.

use super::{DEFAULT_REGION, ReconcileError, Reconciler, api_error};
use crate::cloud::{CloudApi, Firewall, FirewallRequest, FirewallRule, Vpc, VpcRequest};

const VPC_IP_RANGE: &str = "192.168.32.0/24";
const VPC_DESCRIPTION: &str = "VPC for n8n deployment";
const OPEN_CIDR: &str = "0.0.0.0/0";

impl<A: CloudApi> Reconciler<A> {
    /// Ensures the deployment VPC exists.
    ///
    /// The address range is fixed. An existing VPC is adopted as-is and
    /// never mutated.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when listing or creation fails.
    pub async fn ensure_vpc(&self, droplet_name: &str) -> Result<Vpc, ReconcileError> {
        let name = format!("{droplet_name}-vpc");
        let vpcs = self
            .api()
            .list_vpcs()
            .await
            .map_err(|err| api_error("list vpcs", err))?;
        if let Some(vpc) = vpcs.into_iter().find(|vpc| vpc.name == name) {
            tracing::debug!(id = %vpc.id, "vpc already exists");
            return Ok(vpc);
        }

        let request = VpcRequest {
            name: name.clone(),
            region: String::from(DEFAULT_REGION),
            ip_range: String::from(VPC_IP_RANGE),
            description: String::from(VPC_DESCRIPTION),
        };
        tracing::info!(%name, "creating vpc");
        self.api()
            .create_vpc(&request)
            .await
            .map_err(|err| api_error("create vpc", err))
    }

    /// Ensures the deployment firewall carries the fixed rule set: inbound
    /// TCP 22/80/443 from anywhere, outbound TCP 1-65535 to anywhere.
    ///
    /// An existing firewall has its rules replaced on every run; a missing
    /// one is created.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when listing, update, or creation fails.
    pub async fn ensure_firewall(&self, droplet_name: &str) -> Result<Firewall, ReconcileError> {
        let name = format!("{droplet_name}-firewall");
        let request = firewall_request(&name);
        let firewalls = self
            .api()
            .list_firewalls()
            .await
            .map_err(|err| api_error("list firewalls", err))?;
        if let Some(existing) = firewalls.into_iter().find(|firewall| firewall.name == name) {
            tracing::info!(id = %existing.id, "converging firewall rules");
            return self
                .api()
                .update_firewall(&existing.id, &request)
                .await
                .map_err(|err| api_error("update firewall", err));
        }

        tracing::info!(%name, "creating firewall");
        self.api()
            .create_firewall(&request)
            .await
            .map_err(|err| api_error("create firewall", err))
    }
}

fn firewall_request(name: &str) -> FirewallRequest {
    FirewallRequest {
        name: name.to_owned(),
        inbound: vec![
            FirewallRule::tcp("22", &[OPEN_CIDR]),
            FirewallRule::tcp("80", &[OPEN_CIDR]),
            FirewallRule::tcp("443", &[OPEN_CIDR]),
        ],
        outbound: vec![FirewallRule::tcp("1-65535", &[OPEN_CIDR])],
    }
}
