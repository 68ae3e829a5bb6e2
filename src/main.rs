//! Binary entry point for the dockhand CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dockhand::{
    DeployConfig, DeployError, Deployer, DnsWaiter, DoClient, ImagePublisher,
    ProcessCommandRunner, Reconciler, RemoteAuth, Ssh2Shell, SystemResolver, install_private_key,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("SSH key material error: {0}")]
    KeyMaterial(String),
    #[error(transparent)]
    Deploy(#[from] DeployError),
}

#[tokio::main]
async fn main() {
    Cli::parse();
    init_tracing();

    let exit_code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<(), CliError> {
    let config =
        DeployConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    install_key_material(&config)?;

    let api = DoClient::new(&config.api_token);
    let auth = RemoteAuth {
        key_path: config.resolved_ssh_key_path(),
    };
    let deployer = Deployer::new(
        config,
        Reconciler::new(api),
        DnsWaiter::new(SystemResolver),
        ImagePublisher::new(ProcessCommandRunner),
        Ssh2Shell::new(auth),
    );

    let cancel = cancel_on_ctrl_c();
    let outcome = deployer.run(&cancel).await?;
    writeln!(io::stdout(), "n8n deployed at {}", outcome.url).ok();
    Ok(())
}

/// Writes inline key material to the resolved key path before any remote
/// call. A missing `ssh_private_key` is the common case and a no-op.
fn install_key_material(config: &DeployConfig) -> Result<(), CliError> {
    let Some(material) = config.ssh_private_key.as_deref() else {
        return Ok(());
    };
    let destination = config.resolved_ssh_key_path();
    install_private_key(&ProcessCommandRunner, material, &destination)
        .map_err(|err| CliError::KeyMaterial(err.to_string()))
}

/// Cancels the returned token on the first Ctrl-C, letting the deployer
/// stop at its next poll instead of dying mid-request.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping at the next safe point");
            trigger.cancel();
        }
    });
    cancel
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
