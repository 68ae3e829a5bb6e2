//! VPC and firewall endpoints.

use serde::{Deserialize, Serialize};

use crate::cloud::{ApiError, Firewall, FirewallRequest, FirewallRule, Vpc, VpcRequest};

use super::{DoClient, PAGE_SIZE};

#[derive(Serialize)]
struct CreateVpcRequest<'a> {
    name: &'a str,
    region: &'a str,
    ip_range: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct VpcListResponse {
    vpcs: Vec<VpcDto>,
}

#[derive(Deserialize)]
struct VpcEnvelope {
    vpc: VpcDto,
}

#[derive(Deserialize)]
struct VpcDto {
    id: String,
    name: String,
    ip_range: String,
}

impl From<VpcDto> for Vpc {
    fn from(value: VpcDto) -> Self {
        Self {
            id: value.id,
            name: value.name,
            ip_range: value.ip_range,
        }
    }
}

/// Address set attached to a rule: sources inbound, destinations outbound.
#[derive(Default, Deserialize, Serialize)]
struct RuleEndpoints {
    #[serde(default)]
    addresses: Vec<String>,
}

#[derive(Deserialize, Serialize)]
struct InboundRuleDto {
    protocol: String,
    ports: String,
    #[serde(default)]
    sources: RuleEndpoints,
}

#[derive(Deserialize, Serialize)]
struct OutboundRuleDto {
    protocol: String,
    ports: String,
    #[serde(default)]
    destinations: RuleEndpoints,
}

impl From<&FirewallRule> for InboundRuleDto {
    fn from(value: &FirewallRule) -> Self {
        Self {
            protocol: value.protocol.clone(),
            ports: value.ports.clone(),
            sources: RuleEndpoints {
                addresses: value.addresses.clone(),
            },
        }
    }
}

impl From<&FirewallRule> for OutboundRuleDto {
    fn from(value: &FirewallRule) -> Self {
        Self {
            protocol: value.protocol.clone(),
            ports: value.ports.clone(),
            destinations: RuleEndpoints {
                addresses: value.addresses.clone(),
            },
        }
    }
}

impl From<InboundRuleDto> for FirewallRule {
    fn from(value: InboundRuleDto) -> Self {
        Self {
            protocol: value.protocol,
            ports: value.ports,
            addresses: value.sources.addresses,
        }
    }
}

impl From<OutboundRuleDto> for FirewallRule {
    fn from(value: OutboundRuleDto) -> Self {
        Self {
            protocol: value.protocol,
            ports: value.ports,
            addresses: value.destinations.addresses,
        }
    }
}

#[derive(Serialize)]
struct FirewallPayload {
    name: String,
    inbound_rules: Vec<InboundRuleDto>,
    outbound_rules: Vec<OutboundRuleDto>,
}

impl From<&FirewallRequest> for FirewallPayload {
    fn from(value: &FirewallRequest) -> Self {
        Self {
            name: value.name.clone(),
            inbound_rules: value.inbound.iter().map(InboundRuleDto::from).collect(),
            outbound_rules: value.outbound.iter().map(OutboundRuleDto::from).collect(),
        }
    }
}

#[derive(Deserialize)]
struct FirewallListResponse {
    firewalls: Vec<FirewallDto>,
}

#[derive(Deserialize)]
struct FirewallEnvelope {
    firewall: FirewallDto,
}

#[derive(Deserialize)]
struct FirewallDto {
    id: String,
    name: String,
    #[serde(default)]
    inbound_rules: Vec<InboundRuleDto>,
    #[serde(default)]
    outbound_rules: Vec<OutboundRuleDto>,
}

impl From<FirewallDto> for Firewall {
    fn from(value: FirewallDto) -> Self {
        Self {
            id: value.id,
            name: value.name,
            inbound: value
                .inbound_rules
                .into_iter()
                .map(FirewallRule::from)
                .collect(),
            outbound: value
                .outbound_rules
                .into_iter()
                .map(FirewallRule::from)
                .collect(),
        }
    }
}

impl DoClient {
    /// Lists the account's VPC networks.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub(in crate::digitalocean) async fn vpcs(&self) -> Result<Vec<Vpc>, ApiError> {
        let path = format!("/vpcs?per_page={PAGE_SIZE}");
        let parsed: VpcListResponse = self.get(&path).await?.success()?;
        Ok(parsed.vpcs.into_iter().map(Vpc::from).collect())
    }

    /// Creates a VPC network.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the provider rejects the request.
    pub(in crate::digitalocean) async fn add_vpc(
        &self,
        request: &VpcRequest,
    ) -> Result<Vpc, ApiError> {
        let payload = CreateVpcRequest {
            name: &request.name,
            region: &request.region,
            ip_range: &request.ip_range,
            description: &request.description,
        };
        let parsed: VpcEnvelope = self.post("/vpcs", &payload).await?.success()?;
        Ok(parsed.vpc.into())
    }

    /// Lists the account's firewalls.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub(in crate::digitalocean) async fn firewalls(&self) -> Result<Vec<Firewall>, ApiError> {
        let path = format!("/firewalls?per_page={PAGE_SIZE}");
        let parsed: FirewallListResponse = self.get(&path).await?.success()?;
        Ok(parsed.firewalls.into_iter().map(Firewall::from).collect())
    }

    /// Creates a firewall with the requested rules.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the provider rejects the request.
    pub(in crate::digitalocean) async fn add_firewall(
        &self,
        request: &FirewallRequest,
    ) -> Result<Firewall, ApiError> {
        let payload = FirewallPayload::from(request);
        let parsed: FirewallEnvelope = self.post("/firewalls", &payload).await?.success()?;
        Ok(parsed.firewall.into())
    }

    /// Replaces the rule set of firewall `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the provider rejects the request.
    pub(in crate::digitalocean) async fn replace_firewall(
        &self,
        id: &str,
        request: &FirewallRequest,
    ) -> Result<Firewall, ApiError> {
        let payload = FirewallPayload::from(request);
        let path = format!("/firewalls/{id}");
        let parsed: FirewallEnvelope = self.put(&path, &payload).await?.success()?;
        Ok(parsed.firewall.into())
    }
}
