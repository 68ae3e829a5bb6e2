//! Shared in-memory provider API fake for orchestration tests.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::cloud::{
    ApiError, ApiFuture, CloudApi, Domain, DomainRecord, DomainRecordRequest, Droplet,
    DropletRequest, Firewall, FirewallRequest, Registry, RegistryCredentials, SshKey, Vpc,
    VpcRequest,
};

/// Address every fake droplet reports once it turns active.
pub const FAKE_IPV4: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 10);

/// Mutable account state behind [`FakeCloudApi`].
#[derive(Default)]
pub struct FakeState {
    /// SSH keys present on the account.
    pub ssh_keys: Vec<SshKey>,
    /// `(name, public key)` pairs passed to `create_ssh_key`.
    pub key_requests: Vec<(String, String)>,
    /// VPCs present on the account.
    pub vpcs: Vec<Vpc>,
    /// Requests recorded by `create_vpc`.
    pub vpc_requests: Vec<VpcRequest>,
    /// Firewalls present on the account.
    pub firewalls: Vec<Firewall>,
    /// Requests recorded by `create_firewall`.
    pub firewall_creates: Vec<FirewallRequest>,
    /// `(id, request)` pairs recorded by `update_firewall`.
    pub firewall_updates: Vec<(String, FirewallRequest)>,
    /// Scripted `get_registry` responses, popped in FIFO order.
    pub registry_gets: VecDeque<Option<Registry>>,
    /// `(name, tier)` pairs recorded by `create_registry`.
    pub registry_creates: Vec<(String, String)>,
    /// Domains present on the account.
    pub domains: Vec<Domain>,
    /// Domain names recorded by `create_domain`.
    pub domain_creates: Vec<String>,
    /// DNS records in the account's zone.
    pub records: Vec<DomainRecord>,
    /// `(domain, request)` pairs recorded by `create_domain_record`.
    pub record_creates: Vec<(String, DomainRecordRequest)>,
    /// `(domain, record id, request)` triples recorded by `update_domain_record`.
    pub record_updates: Vec<(String, u64, DomainRecordRequest)>,
    /// Droplets present on the account.
    pub droplets: Vec<Droplet>,
    /// Requests recorded by `create_droplet`.
    pub droplet_requests: Vec<DropletRequest>,
    /// Scripted droplet statuses returned by `get_droplet`, popped in FIFO order.
    pub droplet_gets: VecDeque<String>,
    /// When set, `list_droplets` fails with a server error.
    pub fail_list_droplets: bool,
    /// Every API call made so far, in order.
    pub calls: Vec<String>,
}

/// Scripted in-memory stand-in for the provider API.
///
/// Registry lookups and droplet status polls pop scripted responses in FIFO
/// order, with the final entry repeating once the queue is down to one.
/// Clones share state, so a test can keep a handle for inspection after
/// moving the fake into an orchestrator.
#[derive(Clone, Default)]
pub struct FakeCloudApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCloudApi {
    /// Creates a fake with empty account state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the fake state for inspection.
    pub fn guard(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state poisoned")
    }

    /// Seeds the fake account before a test run.
    pub fn configure(&self, mutate: impl FnOnce(&mut FakeState)) {
        mutate(&mut self.guard());
    }

    /// Every API call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.guard().calls.clone()
    }

    /// The subset of [`Self::calls`] that mutated account state.
    pub fn writes(&self) -> Vec<String> {
        self.guard()
            .calls
            .iter()
            .filter(|call| call.starts_with("create") || call.starts_with("update"))
            .cloned()
            .collect()
    }

    fn next_droplet_status(state: &mut FakeState) -> String {
        if state.droplet_gets.len() > 1 {
            state.droplet_gets.pop_front().unwrap_or_default()
        } else {
            state
                .droplet_gets
                .front()
                .cloned()
                .unwrap_or_else(|| String::from("new"))
        }
    }

    fn next_registry(state: &mut FakeState) -> Option<Registry> {
        if state.registry_gets.len() > 1 {
            state.registry_gets.pop_front().flatten()
        } else {
            state.registry_gets.front().cloned().flatten()
        }
    }
}

impl CloudApi for FakeCloudApi {
    fn list_ssh_keys(&self) -> ApiFuture<'_, Vec<SshKey>> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("list ssh keys"));
            Ok(state.ssh_keys.clone())
        })
    }

    fn create_ssh_key<'a>(&'a self, name: &'a str, public_key: &'a str) -> ApiFuture<'a, SshKey> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("create ssh key"));
            state
                .key_requests
                .push((name.to_owned(), public_key.to_owned()));
            let key = SshKey {
                id: 4242,
                fingerprint: String::from("new:fp"),
                name: name.to_owned(),
            };
            state.ssh_keys.push(key.clone());
            Ok(key)
        })
    }

    fn list_vpcs(&self) -> ApiFuture<'_, Vec<Vpc>> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("list vpcs"));
            Ok(state.vpcs.clone())
        })
    }

    fn create_vpc<'a>(&'a self, request: &'a VpcRequest) -> ApiFuture<'a, Vpc> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("create vpc"));
            state.vpc_requests.push(request.clone());
            let vpc = Vpc {
                id: String::from("vpc-created"),
                name: request.name.clone(),
                ip_range: request.ip_range.clone(),
            };
            state.vpcs.push(vpc.clone());
            Ok(vpc)
        })
    }

    fn list_firewalls(&self) -> ApiFuture<'_, Vec<Firewall>> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("list firewalls"));
            Ok(state.firewalls.clone())
        })
    }

    fn create_firewall<'a>(&'a self, request: &'a FirewallRequest) -> ApiFuture<'a, Firewall> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("create firewall"));
            state.firewall_creates.push(request.clone());
            let firewall = Firewall {
                id: String::from("fw-created"),
                name: request.name.clone(),
                inbound: request.inbound.clone(),
                outbound: request.outbound.clone(),
            };
            state.firewalls.push(firewall.clone());
            Ok(firewall)
        })
    }

    fn update_firewall<'a>(&'a self, id: &'a str, request: &'a FirewallRequest) -> ApiFuture<'a, Firewall> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("update firewall"));
            state.firewall_updates.push((id.to_owned(), request.clone()));
            Ok(Firewall {
                id: id.to_owned(),
                name: request.name.clone(),
                inbound: request.inbound.clone(),
                outbound: request.outbound.clone(),
            })
        })
    }

    fn get_registry(&self) -> ApiFuture<'_, Option<Registry>> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("get registry"));
            Ok(Self::next_registry(&mut state))
        })
    }

    fn create_registry<'a>(&'a self, name: &'a str, tier: &'a str) -> ApiFuture<'a, Registry> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("create registry"));
            state
                .registry_creates
                .push((name.to_owned(), tier.to_owned()));
            Ok(Registry {
                name: name.to_owned(),
            })
        })
    }

    fn registry_credentials(&self, _read_write: bool) -> ApiFuture<'_, RegistryCredentials> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("registry credentials"));
            Ok(RegistryCredentials {
                docker_config_json: String::from(r#"{"auths":{}}"#),
            })
        })
    }

    fn get_domain<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Domain>> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("get domain"));
            Ok(state
                .domains
                .iter()
                .find(|domain| domain.name == name)
                .cloned())
        })
    }

    fn create_domain<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Domain> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("create domain"));
            state.domain_creates.push(name.to_owned());
            let domain = Domain {
                name: name.to_owned(),
            };
            state.domains.push(domain.clone());
            Ok(domain)
        })
    }

    fn list_domain_records<'a>(&'a self, _domain: &'a str) -> ApiFuture<'a, Vec<DomainRecord>> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("list domain records"));
            Ok(state.records.clone())
        })
    }

    fn create_domain_record<'a>(
        &'a self,
        domain: &'a str,
        request: &'a DomainRecordRequest,
    ) -> ApiFuture<'a, DomainRecord> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("create domain record"));
            state
                .record_creates
                .push((domain.to_owned(), request.clone()));
            let record = DomainRecord {
                id: 5000,
                record_type: request.record_type.clone(),
                name: request.name.clone(),
                data: request.data.clone(),
                ttl: request.ttl,
            };
            state.records.push(record.clone());
            Ok(record)
        })
    }

    fn update_domain_record<'a>(
        &'a self,
        domain: &'a str,
        record_id: u64,
        request: &'a DomainRecordRequest,
    ) -> ApiFuture<'a, DomainRecord> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("update domain record"));
            state
                .record_updates
                .push((domain.to_owned(), record_id, request.clone()));
            Ok(DomainRecord {
                id: record_id,
                record_type: request.record_type.clone(),
                name: request.name.clone(),
                data: request.data.clone(),
                ttl: request.ttl,
            })
        })
    }

    fn list_droplets(&self) -> ApiFuture<'_, Vec<Droplet>> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("list droplets"));
            if state.fail_list_droplets {
                return Err(server_error());
            }
            Ok(state.droplets.clone())
        })
    }

    fn get_droplet(&self, id: u64) -> ApiFuture<'_, Droplet> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("get droplet"));
            let status = Self::next_droplet_status(&mut state);
            let name = state
                .droplet_requests
                .last()
                .map_or_else(|| String::from("droplet"), |request| request.name.clone());
            let public_ipv4 = (status == "active").then_some(FAKE_IPV4);
            Ok(Droplet {
                id,
                name,
                status,
                public_ipv4,
            })
        })
    }

    fn create_droplet<'a>(&'a self, request: &'a DropletRequest) -> ApiFuture<'a, Droplet> {
        Box::pin(async move {
            let mut state = self.guard();
            state.calls.push(String::from("create droplet"));
            state.droplet_requests.push(request.clone());
            Ok(Droplet {
                id: 9001,
                name: request.name.clone(),
                status: String::from("new"),
                public_ipv4: None,
            })
        })
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        body: String::from("boom"),
    }
}

/// An SSH key already registered on the account.
pub fn account_key(fingerprint: &str) -> SshKey {
    SshKey {
        id: 41,
        fingerprint: fingerprint.to_owned(),
        name: String::from("existing-key"),
    }
}

/// A VPC already present on the account.
pub fn existing_vpc(name: &str) -> Vpc {
    Vpc {
        id: String::from("vpc-existing"),
        name: name.to_owned(),
        ip_range: String::from("192.168.32.0/24"),
    }
}

/// A firewall already present on the account, with stale rules.
pub fn existing_firewall(name: &str) -> Firewall {
    Firewall {
        id: String::from("fw-existing"),
        name: name.to_owned(),
        inbound: Vec::new(),
        outbound: Vec::new(),
    }
}

/// A registry that is already provisioned and ready.
pub fn ready_registry() -> Registry {
    Registry {
        name: String::from("n8n"),
    }
}

/// An existing A record in the zone.
pub fn a_record(id: u64, name: &str, data: &str) -> DomainRecord {
    DomainRecord {
        id,
        record_type: String::from("A"),
        name: name.to_owned(),
        data: data.to_owned(),
        ttl: 3600,
    }
}

/// A droplet that is already active with a public address.
pub fn active_droplet(name: &str) -> Droplet {
    Droplet {
        id: 7,
        name: name.to_owned(),
        status: String::from("active"),
        public_ipv4: Some(FAKE_IPV4),
    }
}
