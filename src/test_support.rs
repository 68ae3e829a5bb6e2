//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;

use tokio::sync::{Mutex, MutexGuard};

use crate::runner::{CommandOutput, CommandRunner, SpawnError};

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Environment variables set for the child process.
    pub env: Vec<(OsString, OsString)>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    responses: VecDeque<Result<CommandOutput, SpawnError>>,
    invocations: Vec<CommandInvocation>,
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
/// Once the queue is exhausted, every further invocation succeeds with empty
/// output.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    state: std::sync::Arc<std::sync::Mutex<ScriptState>>,
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.state
            .lock()
            .map_or_else(|_| Vec::new(), |state| state.invocations.clone())
    }

    /// Pushes an explicit command output response.
    pub fn push_output(&self, output: CommandOutput) {
        if let Ok(mut state) = self.state.lock() {
            state.responses.push_back(Ok(output));
        }
    }

    /// Pushes a successful exit status with the given stdout.
    pub fn push_success(&self, stdout: &str) {
        self.push_output(success_output(stdout));
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32, stderr: &str) {
        self.push_output(failure_output(code, stderr));
    }

    /// Pushes a spawn failure for the next invocation.
    pub fn push_spawn_error(&self, error: SpawnError) {
        if let Ok(mut state) = self.state.lock() {
            state.responses.push_back(Err(error));
        }
    }

    fn dispatch(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(OsString, OsString)],
    ) -> Result<CommandOutput, SpawnError> {
        let mut state = self.state.lock().map_err(|_| SpawnError {
            program: program.to_owned(),
            message: String::from("scripted runner state poisoned"),
        })?;
        state.invocations.push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            env: env.to_vec(),
        });
        state
            .responses
            .pop_front()
            .unwrap_or_else(|| Ok(success_output("")))
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SpawnError> {
        self.dispatch(program, args, &[])
    }

    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(OsString, OsString)],
    ) -> Result<CommandOutput, SpawnError> {
        self.dispatch(program, args, env)
    }
}

/// Builds a zero-exit [`CommandOutput`] with the given stdout.
#[must_use]
pub fn success_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.to_owned(),
        stderr: String::new(),
    }
}

/// Builds a failing [`CommandOutput`] with the given exit code and stderr.
#[must_use]
pub fn failure_output(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_owned(),
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
