//! Command-line interface definition for the `dockhand` binary.
//!
//! This module centralises the clap parser structure so both the main binary
//! and the build script can reuse it when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `dockhand` binary.
///
/// Invoking the binary runs one deployment end to end. Deployment
/// parameters come from `DOCKHAND_*` environment variables or
/// `dockhand.toml` rather than flags, so the same invocation works locally
/// and in CI.
#[derive(Debug, Parser)]
#[command(
    name = "dockhand",
    about = "Provision DigitalOcean infrastructure and deploy the n8n stack",
    long_about = None,
    version
)]
pub(crate) struct Cli {}
