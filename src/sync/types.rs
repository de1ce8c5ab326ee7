//! Core sync types and command runner abstraction.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use camino::Utf8PathBuf;

use crate::sync::SyncError;

/// Target for rsync either on a remote host or locally (used for tests).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncDestination {
    /// Remote sync target.
    Remote {
        /// User used to authenticate via SSH.
        user: String,
        /// Hostname or address.
        host: String,
        /// Path on the remote machine that receives files.
        path: Utf8PathBuf,
        /// Options for the `ssh` client spawned by rsync.
        shell: RshOptions,
    },
    /// Local path used for behavioural tests and dry-runs.
    Local {
        /// Destination path for the synchronised content.
        path: Utf8PathBuf,
    },
}

/// Options rendered into rsync's `--rsh` command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RshOptions {
    /// SSH port on the remote host.
    pub port: u16,
    /// Private key passed with `-i`.
    pub identity_file: Option<Utf8PathBuf>,
    /// Whether host keys must already be known.
    pub strict_host_key_checking: bool,
    /// Known hosts file override.
    pub known_hosts_file: Option<String>,
}

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError>;
}

/// Real command runner that captures output without echoing it.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| SyncError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Command runner that forwards output to the local terminal as it arrives
/// while also capturing it.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamingCommandRunner;

impl CommandRunner for StreamingCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError> {
        let spawn_error = |message: String| SyncError::Spawn {
            program: program.to_owned(),
            message,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error(err.to_string()))?;

        let stdout_relay = child
            .stdout
            .take()
            .map(|pipe| thread::spawn(move || tee(pipe, io::stdout())));
        let stderr_relay = child
            .stderr
            .take()
            .map(|pipe| thread::spawn(move || tee(pipe, io::stderr())));

        let status = child.wait().map_err(|err| spawn_error(err.to_string()))?;
        let stdout = join_relay(stdout_relay).map_err(spawn_error)?;
        let stderr = join_relay(stderr_relay).map_err(spawn_error)?;

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

type RelayHandle = thread::JoinHandle<io::Result<Vec<u8>>>;

fn join_relay(handle: Option<RelayHandle>) -> Result<String, String> {
    let Some(relay) = handle else {
        return Ok(String::new());
    };
    let bytes = relay
        .join()
        .map_err(|_| String::from("output relay thread panicked"))?
        .map_err(|err| err.to_string())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn tee(mut source: impl Read, mut sink: impl Write) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        let chunk = buffer.get(..read).unwrap_or_default();
        sink.write_all(chunk)?;
        sink.flush()?;
        captured.extend_from_slice(chunk);
    }
    Ok(captured)
}
