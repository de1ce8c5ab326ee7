//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::rc::Rc;
use std::sync::{Arc, PoisonError};

use tokio::sync::{Mutex, MutexGuard};

use crate::session::{
    ExitStatus, OutputMode, RemoteCommandOutput, RemoteShell, SessionError, ShellFuture,
};
use crate::sync::{CommandOutput, CommandRunner, SyncError};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
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
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| SyncError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Records a single command sent through [`ScriptedShell`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShellInvocation {
    /// Command line as sent to the remote shell.
    pub command: String,
    /// Output mode requested by the caller.
    pub mode: OutputMode,
}

#[derive(Debug, Default)]
struct ShellScript {
    responses: VecDeque<Result<RemoteCommandOutput, SessionError>>,
    invocations: Vec<ShellInvocation>,
}

/// Scripted remote shell that replays queued results in FIFO order.
///
/// Clones share one script, so a test can keep a handle for assertions while
/// the code under test owns another. Commands issued after the script runs
/// dry succeed with status zero.
#[derive(Clone, Debug, Default)]
pub struct ScriptedShell {
    script: Arc<std::sync::Mutex<ShellScript>>,
}

impl ScriptedShell {
    /// Creates a shell with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a command exiting with `code`.
    pub fn push_exit(&self, code: u32) {
        self.push_result(Ok(RemoteCommandOutput::from_status(ExitStatus::Exited(
            code,
        ))));
    }

    /// Queues a command exiting with `code` after writing `stderr`.
    pub fn push_exit_with_stderr(&self, code: u32, stderr: impl Into<String>) {
        self.push_result(Ok(RemoteCommandOutput {
            status: ExitStatus::Exited(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }));
    }

    /// Queues an arbitrary result, including session failures.
    pub fn push_result(&self, result: Result<RemoteCommandOutput, SessionError>) {
        self.lock().responses.push_back(result);
    }

    /// Returns a snapshot of all commands recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<ShellInvocation> {
        self.lock().invocations.clone()
    }

    /// Returns only the command lines recorded so far.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .invocations
            .iter()
            .map(|invocation| invocation.command.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ShellScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RemoteShell for ScriptedShell {
    fn run<'a>(&'a mut self, command: &'a str, mode: OutputMode) -> ShellFuture<'a> {
        let result = {
            let mut script = self.lock();
            script.invocations.push(ShellInvocation {
                command: command.to_owned(),
                mode,
            });
            script
                .responses
                .pop_front()
                .unwrap_or_else(|| Ok(RemoteCommandOutput::from_status(ExitStatus::Exited(0))))
        };
        Box::pin(async move { result })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
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
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`.
            unsafe { env::set_var(key, value) };
        }

        Self {
            previous,
            _guard: guard,
        }
    }

    /// Removes variables for the guard's lifetime, restoring them on drop.
    pub async fn unset_vars(keys: &[&str]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(keys.len());
        for key in keys {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`.
            unsafe { env::remove_var(key) };
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
