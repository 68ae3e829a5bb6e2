//! End-to-end orchestration tests against scripted fakes.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{DeployError, Deployer};
use crate::cloud::Domain;
use crate::config::DeployConfig;
use crate::dns::{DnsError, DnsWaiter, LookupFuture, RecordLookup};
use crate::image::ImagePublisher;
use crate::reconcile::Reconciler;
use crate::remote::{RemoteError, RemoteShell, RemoteTarget};
use crate::test_helpers::{
    FAKE_IPV4, FakeCloudApi, a_record, account_key, active_droplet, existing_firewall,
    existing_vpc, ready_registry,
};
use crate::test_support::ScriptedRunner;

/// Lookup that always serves the same fixed address set.
struct FakeLookup {
    addresses: Vec<Ipv4Addr>,
}

impl RecordLookup for FakeLookup {
    fn resolve_a<'a>(&'a self, _fqdn: &'a str) -> LookupFuture<'a> {
        Box::pin(async move { Ok(self.addresses.clone()) })
    }
}

#[derive(Default)]
struct ShellState {
    failures: VecDeque<RemoteError>,
    scripts: Vec<(String, String)>,
}

/// Records every script with its `user@host` target. Clones share state.
#[derive(Clone, Default)]
struct FakeShell {
    state: Arc<Mutex<ShellState>>,
}

impl FakeShell {
    fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ShellState> {
        self.state.lock().expect("fake shell poisoned")
    }

    fn fail_next(&self, error: RemoteError) {
        self.lock().failures.push_back(error);
    }

    fn scripts(&self) -> Vec<(String, String)> {
        self.lock().scripts.clone()
    }
}

impl RemoteShell for FakeShell {
    fn run_script(&self, target: &RemoteTarget, script: &str) -> Result<String, RemoteError> {
        let mut state = self.lock();
        state
            .scripts
            .push((format!("{}@{}", target.user, target.host), script.to_owned()));
        state
            .failures
            .pop_front()
            .map_or_else(|| Ok(String::new()), Err)
    }
}

fn deploy_config() -> DeployConfig {
    DeployConfig {
        api_token: String::from("do-token"),
        registry_url: String::from("registry.digitalocean.com"),
        droplet_name: String::from("n8n-production"),
        ssh_key_fingerprint: String::from("aa:bb"),
        domain: String::from("n8n.example.com"),
        n8n_version: String::from("1.63.4"),
        slack_webhook: None,
        alert_email: None,
        encryption_key: String::from("key-material"),
        basic_auth_user: String::from("admin"),
        basic_auth_pass: String::from("hunter2"),
        email_mode: None,
        ssh_key_path: None,
        ssh_private_key: None,
    }
}

fn fast_deployer(
    api: FakeCloudApi,
    lookup: FakeLookup,
    runner: ScriptedRunner,
    shell: FakeShell,
) -> Deployer<FakeCloudApi, FakeLookup, ScriptedRunner, FakeShell> {
    let reconciler = Reconciler::new(api)
        .with_status_poll_interval(Duration::from_millis(1))
        .with_ssh_settle_delay(Duration::from_millis(1))
        .with_active_timeout(Duration::from_millis(100))
        .with_registry_retry_delay(Duration::from_millis(1));
    let dns =
        DnsWaiter::new(lookup).with_intervals(Duration::from_millis(1), Duration::from_millis(50));
    Deployer::new(
        deploy_config(),
        reconciler,
        dns,
        ImagePublisher::new(runner),
        shell,
    )
}

/// Account state after a previous successful run.
fn seed_converged(api: &FakeCloudApi) {
    api.configure(|state| {
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
}

/// Account holding only the operator's SSH key; the registry turns ready
/// after creation and the droplet turns active after one poll.
fn seed_fresh(api: &FakeCloudApi) {
    api.configure(|state| {
        state.ssh_keys.push(account_key("aa:bb"));
        state.registry_gets = VecDeque::from([None, Some(ready_registry())]);
        state.droplet_gets = VecDeque::from([String::from("new"), String::from("active")]);
    });
}

#[tokio::test]
async fn first_run_provisions_bootstraps_and_deploys() {
    let api = FakeCloudApi::new();
    seed_fresh(&api);
    let runner = ScriptedRunner::new();
    let shell = FakeShell::new();
    let deployer = fast_deployer(
        api.clone(),
        FakeLookup {
            addresses: vec![FAKE_IPV4],
        },
        runner.clone(),
        shell.clone(),
    );

    let outcome = deployer
        .run(&CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("deployment failed: {err}"));

    assert_eq!(outcome.droplet_ip, FAKE_IPV4);
    assert_eq!(outcome.url, "https://n8n.example.com");
    assert_eq!(
        outcome.image.latest,
        "registry.digitalocean.com/n8n/n8n:latest"
    );
    assert_eq!(
        outcome.image.immutable,
        "registry.digitalocean.com/n8n/n8n:1.63.4"
    );

    assert_eq!(
        api.writes(),
        vec![
            String::from("create vpc"),
            String::from("create firewall"),
            String::from("create registry"),
            String::from("create domain"),
            String::from("create droplet"),
            String::from("create domain record"),
        ],
        "a first run must create every managed resource"
    );

    let scripts = shell.scripts();
    assert_eq!(scripts.len(), 2, "bootstrap then deployment: {scripts:?}");
    let Some((bootstrap_target, bootstrap_script)) = scripts.first() else {
        panic!("bootstrap script missing");
    };
    assert_eq!(bootstrap_target, "root@203.0.113.10");
    assert!(bootstrap_script.contains("useradd -m -s /bin/bash n8n"));
    let Some((deploy_target, deploy_script)) = scripts.get(1) else {
        panic!("deployment script missing");
    };
    assert_eq!(deploy_target, "root@203.0.113.10");
    assert!(deploy_script.contains("cat > /opt/n8n/docker-compose.yml"));
    assert!(deploy_script.contains("registry.digitalocean.com/n8n/n8n:latest"));

    let docker = runner.invocations();
    assert_eq!(docker.len(), 3, "one build and two pushes: {docker:?}");
}

#[tokio::test]
async fn rerun_skips_bootstrap_but_redeploys() {
    let api = FakeCloudApi::new();
    seed_converged(&api);
    let runner = ScriptedRunner::new();
    let shell = FakeShell::new();
    let deployer = fast_deployer(
        api.clone(),
        FakeLookup {
            addresses: vec![FAKE_IPV4],
        },
        runner.clone(),
        shell.clone(),
    );

    deployer
        .run(&CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("deployment failed: {err}"));

    let scripts = shell.scripts();
    assert_eq!(
        scripts.len(),
        1,
        "adopted droplet must not be bootstrapped again: {scripts:?}"
    );
    assert!(
        scripts
            .first()
            .is_some_and(|(target, script)| target == "root@203.0.113.10"
                && script.contains("docker-compose")),
        "expected only the deployment script: {scripts:?}"
    );
    assert_eq!(
        api.writes(),
        vec![String::from("update firewall")],
        "a converged account must only re-assert firewall rules"
    );
    assert_eq!(runner.invocations().len(), 3, "the image is always rebuilt");
}

#[tokio::test]
async fn propagation_timeout_aborts_before_publishing() {
    let api = FakeCloudApi::new();
    seed_converged(&api);
    let runner = ScriptedRunner::new();
    let shell = FakeShell::new();
    let deployer = fast_deployer(
        api,
        FakeLookup {
            addresses: Vec::new(),
        },
        runner.clone(),
        shell.clone(),
    );

    let result = deployer.run(&CancellationToken::new()).await;

    assert!(
        matches!(
            result,
            Err(DeployError::Dns {
                source: DnsError::PropagationTimeout { .. }
            })
        ),
        "unexpected result: {result:?}"
    );
    assert!(
        runner.invocations().is_empty(),
        "the image must not build while the record is unresolvable"
    );
    assert!(shell.scripts().is_empty());
}

#[tokio::test]
async fn failed_image_build_aborts_before_deployment() {
    let api = FakeCloudApi::new();
    seed_converged(&api);
    let runner = ScriptedRunner::new();
    runner.push_failure(1, "docker build exploded");
    let shell = FakeShell::new();
    let deployer = fast_deployer(
        api,
        FakeLookup {
            addresses: vec![FAKE_IPV4],
        },
        runner.clone(),
        shell.clone(),
    );

    let result = deployer.run(&CancellationToken::new()).await;

    assert!(
        matches!(result, Err(DeployError::Publish { .. })),
        "unexpected result: {result:?}"
    );
    assert!(
        shell.scripts().is_empty(),
        "the deployment script must not run after a failed build"
    );
}

#[tokio::test]
async fn bootstrap_failure_is_fatal() {
    let api = FakeCloudApi::new();
    seed_fresh(&api);
    let runner = ScriptedRunner::new();
    let shell = FakeShell::new();
    shell.fail_next(RemoteError::Exec {
        status: 1,
        output: String::from("useradd: cannot lock /etc/passwd"),
    });
    let deployer = fast_deployer(
        api,
        FakeLookup {
            addresses: vec![FAKE_IPV4],
        },
        runner.clone(),
        shell.clone(),
    );

    let result = deployer.run(&CancellationToken::new()).await;

    assert!(
        matches!(result, Err(DeployError::Bootstrap { .. })),
        "unexpected result: {result:?}"
    );
    assert_eq!(shell.scripts().len(), 1);
    assert!(
        runner.invocations().is_empty(),
        "no image work may happen on a half-bootstrapped droplet"
    );
}

#[tokio::test]
async fn provider_failure_names_the_failing_step() {
    let api = FakeCloudApi::new();
    api.configure(|state| {
        state.ssh_keys.push(account_key("aa:bb"));
        state.vpcs.push(existing_vpc("n8n-production-vpc"));
        state
            .firewalls
            .push(existing_firewall("n8n-production-firewall"));
        state.registry_gets = VecDeque::from([Some(ready_registry())]);
        state.domains.push(Domain {
            name: String::from("example.com"),
        });
        state.fail_list_droplets = true;
    });
    let deployer = fast_deployer(
        api,
        FakeLookup {
            addresses: vec![FAKE_IPV4],
        },
        ScriptedRunner::new(),
        FakeShell::new(),
    );

    let result = deployer.run(&CancellationToken::new()).await;

    assert!(
        matches!(result, Err(DeployError::Converge { step: "droplet", .. })),
        "unexpected result: {result:?}"
    );
}
