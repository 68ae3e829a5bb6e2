//! Blocking SSH session built on `libssh2`.

use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use ssh2::Session;

use super::{RemoteAuth, RemoteError, RemoteShell, RemoteTarget};

const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Output of a single remote command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecOutput {
    /// Exit status reported by the remote shell.
    pub status: i32,
    /// Interleaved stdout and stderr.
    pub output: String,
}

/// Established SSH session. Every [`execute`](Self::execute) call opens a
/// fresh channel, mirroring one-shot `ssh` invocations.
pub struct RemoteSession {
    session: Session,
}

impl RemoteSession {
    /// Connects to `target` and authenticates, preferring the SSH agent and
    /// falling back to the key file in `auth`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Dial`] when the host is unreachable within the
    /// dial timeout, [`RemoteError::Session`] when the handshake fails, and
    /// [`RemoteError::Auth`] when no authentication method is accepted.
    pub fn connect(target: &RemoteTarget, auth: &RemoteAuth) -> Result<Self, RemoteError> {
        let address = SocketAddr::new(target.host, target.port);
        let tcp = TcpStream::connect_timeout(&address, DIAL_TIMEOUT).map_err(|err| {
            RemoteError::Dial {
                address: address.to_string(),
                message: err.to_string(),
            }
        })?;
        let mut session = Session::new().map_err(session_error)?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(session_error)?;
        authenticate(&session, target, auth)?;
        tracing::debug!(%address, user = %target.user, "ssh session established");
        Ok(Self { session })
    }

    /// Runs `command` in a new channel and captures its combined output.
    /// The output is returned for every exit status; callers decide whether
    /// a non-zero status is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Session`] when the channel cannot be opened or
    /// drained.
    pub fn execute(&self, command: &str) -> Result<ExecOutput, RemoteError> {
        let mut channel = self.session.channel_session().map_err(session_error)?;
        channel.exec(command).map_err(session_error)?;

        let mut output = String::new();
        channel.read_to_string(&mut output).map_err(read_error)?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(read_error)?;
        if !stderr.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&stderr);
        }

        channel.wait_close().map_err(session_error)?;
        let status = channel.exit_status().map_err(session_error)?;
        Ok(ExecOutput { status, output })
    }
}

fn authenticate(
    session: &Session,
    target: &RemoteTarget,
    auth: &RemoteAuth,
) -> Result<(), RemoteError> {
    if session.userauth_agent(&target.user).is_ok() && session.authenticated() {
        return Ok(());
    }
    session
        .userauth_pubkey_file(&target.user, None, auth.key_path.as_std_path(), None)
        .map_err(|err| RemoteError::Auth {
            user: target.user.clone(),
            message: err.to_string(),
        })?;
    if session.authenticated() {
        Ok(())
    } else {
        Err(RemoteError::Auth {
            user: target.user.clone(),
            message: String::from("no authentication method accepted"),
        })
    }
}

fn session_error(err: ssh2::Error) -> RemoteError {
    RemoteError::Session {
        message: err.to_string(),
    }
}

fn read_error(err: std::io::Error) -> RemoteError {
    RemoteError::Session {
        message: err.to_string(),
    }
}

/// [`RemoteShell`] implementation that opens a fresh session per script.
pub struct Ssh2Shell {
    auth: RemoteAuth,
}

impl Ssh2Shell {
    /// Builds a shell authenticating with `auth`.
    #[must_use]
    pub const fn new(auth: RemoteAuth) -> Self {
        Self { auth }
    }
}

impl RemoteShell for Ssh2Shell {
    fn run_script(&self, target: &RemoteTarget, script: &str) -> Result<String, RemoteError> {
        let session = RemoteSession::connect(target, &self.auth)?;
        let result = session.execute(script)?;
        if result.status != 0 {
            return Err(RemoteError::Exec {
                status: result.status,
                output: result.output,
            });
        }
        Ok(result.output)
    }
}
