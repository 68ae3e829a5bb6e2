//! Resource model shared by the provider client, the reconciler, and fakes.

use std::net::Ipv4Addr;

/// SSH key registered with the provider account.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshKey {
    /// Provider-assigned numeric identifier.
    pub id: u64,
    /// Key fingerprint used for account inventory matching.
    pub fingerprint: String,
    /// Human readable key name.
    pub name: String,
}

/// Virtual private cloud network.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Vpc {
    /// Provider-assigned identifier.
    pub id: String,
    /// Deterministic network name (`{droplet}-vpc`).
    pub name: String,
    /// Private address range assigned to the network.
    pub ip_range: String,
}

/// Parameters for creating a VPC.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VpcRequest {
    /// Network name.
    pub name: String,
    /// Region slug the network is placed in.
    pub region: String,
    /// Private address range to assign.
    pub ip_range: String,
    /// Free-form description shown in the provider console.
    pub description: String,
}

/// Single firewall rule. The same shape is used for inbound rules (where
/// `addresses` are sources) and outbound rules (where they are
/// destinations).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FirewallRule {
    /// Transport protocol (`tcp`, `udp`, `icmp`).
    pub protocol: String,
    /// Single port or `low-high` range.
    pub ports: String,
    /// CIDR blocks the rule applies to.
    pub addresses: Vec<String>,
}

impl FirewallRule {
    /// Builds a TCP rule for `ports` open to the given CIDR blocks.
    #[must_use]
    pub fn tcp(ports: &str, addresses: &[&str]) -> Self {
        Self {
            protocol: String::from("tcp"),
            ports: ports.to_owned(),
            addresses: addresses.iter().map(|addr| String::from(*addr)).collect(),
        }
    }
}

/// Cloud firewall with its current rule set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Firewall {
    /// Provider-assigned identifier.
    pub id: String,
    /// Deterministic firewall name (`{droplet}-firewall`).
    pub name: String,
    /// Current inbound rules.
    pub inbound: Vec<FirewallRule>,
    /// Current outbound rules.
    pub outbound: Vec<FirewallRule>,
}

/// Desired firewall state submitted on create and update.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FirewallRequest {
    /// Firewall name.
    pub name: String,
    /// Desired inbound rules.
    pub inbound: Vec<FirewallRule>,
    /// Desired outbound rules.
    pub outbound: Vec<FirewallRule>,
}

/// Container registry attached to the account. One registry per account.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Registry {
    /// Registry name, used as the repository namespace.
    pub name: String,
}

/// Short-lived docker credentials minted for the account registry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistryCredentials {
    /// Raw `config.json` content understood by the docker CLI.
    pub docker_config_json: String,
}

/// DNS zone managed by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Domain {
    /// Fully qualified zone name.
    pub name: String,
}

/// DNS record within a managed zone.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DomainRecord {
    /// Provider-assigned identifier.
    pub id: u64,
    /// Record type (`A`, `CNAME`, ...).
    pub record_type: String,
    /// Record name relative to the zone (`@` for the apex).
    pub name: String,
    /// Record payload; the target address for `A` records.
    pub data: String,
    /// Time-to-live in seconds.
    pub ttl: u32,
}

/// Desired DNS record state submitted on create and update.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DomainRecordRequest {
    /// Record type.
    pub record_type: String,
    /// Record name relative to the zone.
    pub name: String,
    /// Record payload.
    pub data: String,
    /// Time-to-live in seconds.
    pub ttl: u32,
}

/// Compute instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Droplet {
    /// Provider-assigned numeric identifier.
    pub id: u64,
    /// Droplet name, the reconciliation key.
    pub name: String,
    /// Lifecycle status reported by the provider (`new`, `active`, ...).
    pub status: String,
    /// Public IPv4 address once networking is provisioned.
    pub public_ipv4: Option<Ipv4Addr>,
}

/// Parameters for creating a droplet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DropletRequest {
    /// Droplet name.
    pub name: String,
    /// Region slug.
    pub region: String,
    /// Size slug (for example `s-2vcpu-2gb`).
    pub size: String,
    /// Image slug (for example `docker-20-04`).
    pub image: String,
    /// SSH key installed for root on first boot.
    pub ssh_key_id: u64,
    /// VPC the droplet joins.
    pub vpc_id: String,
    /// Tags applied to the droplet.
    pub tags: Vec<String>,
    /// Enables the provider monitoring agent.
    pub monitoring: bool,
    /// Enables IPv6 networking.
    pub ipv6: bool,
    /// Enables provider-side disk backups.
    pub backups: bool,
    /// First-boot script executed by cloud-init.
    pub user_data: String,
}
