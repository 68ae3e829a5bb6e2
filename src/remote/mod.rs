//! Remote command execution over SSH.
//!
//! Bootstrap and deployment run shell scripts on the droplet. The
//! [`RemoteShell`] trait is the seam the orchestrator depends on; the
//! production implementation opens a fresh `libssh2` session per script so
//! no channel state leaks between steps.

mod session;

pub use session::{ExecOutput, RemoteSession, Ssh2Shell};

use std::net::IpAddr;

use camino::Utf8PathBuf;
use thiserror::Error;

const DEFAULT_SSH_PORT: u16 = 22;

/// Remote host and account a session connects to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteTarget {
    /// Host address.
    pub host: IpAddr,
    /// SSH port.
    pub port: u16,
    /// Account to authenticate as.
    pub user: String,
}

impl RemoteTarget {
    /// Builds a target for `user@host` on the default SSH port.
    #[must_use]
    pub fn new(host: IpAddr, user: &str) -> Self {
        Self {
            host,
            port: DEFAULT_SSH_PORT,
            user: user.to_owned(),
        }
    }
}

/// Key material used when agent authentication is unavailable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteAuth {
    /// Path of the private key file.
    pub key_path: Utf8PathBuf,
}

/// Errors raised during remote execution.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Raised when the TCP connection cannot be established.
    #[error("failed to reach {address}: {message}")]
    Dial {
        /// Address the dial was attempted against.
        address: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when every authentication method is rejected.
    #[error("SSH authentication failed for {user}: {message}")]
    Auth {
        /// Account the authentication was attempted for.
        user: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the SSH transport or channel fails.
    #[error("SSH session error: {message}")]
    Session {
        /// Underlying error message.
        message: String,
    },
    /// Raised when a remote command exits non-zero. The combined output is
    /// preserved so failures stay diagnosable from logs.
    #[error("remote command exited with status {status}: {output}")]
    Exec {
        /// Exit status reported by the remote shell.
        status: i32,
        /// Interleaved stdout and stderr of the failed command.
        output: String,
    },
}

/// Executes scripts on a remote host.
pub trait RemoteShell: Send + Sync {
    /// Runs `script` on `target`, returning the combined output on success.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the connection, authentication, or the
    /// script itself fails. A non-zero exit maps to [`RemoteError::Exec`]
    /// with the output retained.
    fn run_script(&self, target: &RemoteTarget, script: &str) -> Result<String, RemoteError>;
}
