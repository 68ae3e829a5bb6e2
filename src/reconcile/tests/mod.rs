//! Unit tests for the resource reconciler.

use std::collections::VecDeque;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{ReconcileError, Reconciler};
use crate::cloud::{Domain, Registry};
use crate::test_helpers::{
    FAKE_IPV4, FakeCloudApi, a_record, account_key, active_droplet, existing_firewall,
    existing_vpc, ready_registry,
};


fn fast_reconciler(fake: FakeCloudApi) -> Reconciler<FakeCloudApi> {
    Reconciler::new(fake)
        .with_status_poll_interval(Duration::from_millis(1))
        .with_ssh_settle_delay(Duration::from_millis(1))
        .with_active_timeout(Duration::from_millis(100))
        .with_registry_retry_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn second_run_only_rewrites_firewall_rules() {
    let fake = FakeCloudApi::new();
    fake.configure(|state| {
        state.ssh_keys.push(account_key("aa:bb"));
        state.vpcs.push(existing_vpc("n8n-production-vpc"));
        state
            .firewalls
            .push(existing_firewall("n8n-production-firewall"));
        state.registry_gets = VecDeque::from([Some(ready_registry())]);
        state.domains.push(Domain {
            name: String::from("example.com"),
        });
        state.records.push(a_record(7, "n8n", "203.0.113.10"));
        state.droplets.push(active_droplet("n8n-production"));
    });
    let reconciler = fast_reconciler(fake);
    let cancel = CancellationToken::new();

    let key = reconciler
        .ensure_ssh_key("aa:bb", "n8n-production", camino::Utf8Path::new("/unused/id_rsa"))
        .await
        .unwrap_or_else(|err| panic!("ensure_ssh_key failed: {err}"));
    let vpc = reconciler
        .ensure_vpc("n8n-production")
        .await
        .unwrap_or_else(|err| panic!("ensure_vpc failed: {err}"));
    reconciler
        .ensure_firewall("n8n-production")
        .await
        .unwrap_or_else(|err| panic!("ensure_firewall failed: {err}"));
    reconciler
        .ensure_registry()
        .await
        .unwrap_or_else(|err| panic!("ensure_registry failed: {err}"));
    reconciler
        .ensure_domain("n8n.example.com")
        .await
        .unwrap_or_else(|err| panic!("ensure_domain failed: {err}"));
    let outcome = reconciler
        .ensure_droplet("n8n-production", key.id, &vpc.id, "#!/bin/bash", &cancel)
        .await
        .unwrap_or_else(|err| panic!("ensure_droplet failed: {err}"));
    reconciler
        .ensure_dns_record("n8n.example.com", outcome.address)
        .await
        .unwrap_or_else(|err| panic!("ensure_dns_record failed: {err}"));

    assert!(!outcome.created, "converged droplet must be adopted");
    let writes = reconciler.api().writes();
    assert_eq!(
        writes,
        vec![String::from("update firewall")],
        "converged infrastructure must only re-assert firewall rules"
    );
}
