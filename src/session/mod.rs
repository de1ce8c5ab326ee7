//! Remote session runner.
//!
//! A [`Session`] owns one authenticated SSH transport. Commands run one at a
//! time on their own execution channel; stdout and stderr are relayed to the
//! matching local streams as they arrive and the remote exit status is
//! returned unchanged. A local Ctrl-C closes the channel and yields
//! [`ExitStatus::Interrupted`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use russh::Disconnect;
use russh::client::{self, Handle};
use tokio::io::AsyncWrite;
use tracing::{debug, info};

mod auth;
mod channel;
mod error;
mod handler;
mod relay;
mod types;

pub use auth::{AgentAuth, AuthChain, AuthFuture, Authenticator, IdentityFileAuth};
pub use error::SessionError;
pub use handler::{ClientHandler, HostKeyPolicy};
pub use types::{
    ExitStatus, INTERRUPTED_EXIT_CODE, OutputMode, RemoteCommandOutput, UNKNOWN_EXIT_CODE,
};

use relay::{EventSource, relay};

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Connection parameters for a remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionTarget {
    /// Hostname or address of the remote machine.
    pub hostname: String,
    /// SSH port.
    pub port: u16,
    /// Remote user to log in as.
    pub user: String,
}

impl SessionTarget {
    /// Builds a target, defaulting the port to 22 and the user to the local
    /// user name.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTarget`] when the hostname is blank, the
    /// port is zero, or no user can be determined.
    pub fn new(
        hostname: &str,
        port: Option<u16>,
        user: Option<&str>,
    ) -> Result<Self, SessionError> {
        let host = hostname.trim();
        if host.is_empty() {
            return Err(SessionError::InvalidTarget(String::from(
                "hostname must not be empty",
            )));
        }

        let resolved_port = port.unwrap_or(DEFAULT_SSH_PORT);
        if resolved_port == 0 {
            return Err(SessionError::InvalidTarget(String::from(
                "port must be greater than zero",
            )));
        }

        let resolved_user = match user.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => local_username().ok_or_else(|| {
                SessionError::InvalidTarget(String::from(
                    "no remote user configured and the local user name is unknown",
                ))
            })?,
        };

        Ok(Self {
            hostname: host.to_owned(),
            port: resolved_port,
            user: resolved_user,
        })
    }
}

/// Returns the invoking user's login name from the environment.
#[must_use]
pub fn local_username() -> Option<String> {
    ["USER", "LOGNAME", "USERNAME"]
        .into_iter()
        .filter_map(std::env::var_os)
        .map(|value| value.to_string_lossy().trim().to_owned())
        .find(|value| !value.is_empty())
}

/// Future returned by [`RemoteShell::run`].
pub type ShellFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RemoteCommandOutput, SessionError>> + Send + 'a>>;

/// Something that can run shell commands on the remote host.
///
/// [`Session`] is the production implementation; tests substitute scripted
/// shells.
pub trait RemoteShell {
    /// Runs `command` with the remote login shell and waits for it to finish.
    fn run<'a>(&'a mut self, command: &'a str, mode: OutputMode) -> ShellFuture<'a>;
}

/// One authenticated SSH connection.
pub struct Session {
    target: SessionTarget,
    handle: Handle<ClientHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connects to `target` and authenticates with `auth`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connect`] when the host cannot be reached or the
    /// handshake fails (including a rejected host key) and
    /// [`SessionError::Auth`] when no identity is accepted.
    pub async fn connect<A>(
        target: &SessionTarget,
        policy: HostKeyPolicy,
        auth: &A,
    ) -> Result<Self, SessionError>
    where
        A: Authenticator + ?Sized,
    {
        let config = Arc::new(client::Config::default());
        let handler = ClientHandler::new(policy, target.hostname.clone(), target.port);
        info!(host = %target.hostname, port = target.port, user = %target.user, "connecting");

        let mut handle = client::connect(
            config,
            (target.hostname.as_str(), target.port),
            handler,
        )
        .await
        .map_err(|err| SessionError::Connect {
            host: target.hostname.clone(),
            port: target.port,
            message: err.to_string(),
        })?;

        if !auth.authenticate(&mut handle, &target.user).await? {
            return Err(SessionError::Auth {
                user: target.user.clone(),
                message: format!("{} rejected", auth.describe()),
            });
        }

        Ok(Self {
            target: target.clone(),
            handle,
        })
    }

    /// Runs `command` remotely, relaying output according to `mode`.
    ///
    /// Returns once the channel closes. A non-zero remote exit is reported in
    /// the returned status, not as an error. Ctrl-C while the command runs
    /// closes the channel and returns [`ExitStatus::Interrupted`]; the remote
    /// process itself may keep running.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Channel`] when the channel cannot be opened,
    /// [`SessionError::ConnectionLost`] when the transport drops before a
    /// status arrives, and [`SessionError::LocalIo`] when local output cannot
    /// be written.
    pub async fn execute(
        &mut self,
        command: &str,
        mode: OutputMode,
    ) -> Result<RemoteCommandOutput, SessionError> {
        debug!(command, ?mode, "running remote command");
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|err| SessionError::Channel(err.to_string()))?;
        channel
            .exec(true, command)
            .await
            .map_err(|err| SessionError::Channel(err.to_string()))?;

        match mode {
            OutputMode::Echo => {
                let status = relay_to(
                    &mut channel,
                    &mut tokio::io::stdout(),
                    &mut tokio::io::stderr(),
                )
                .await?;
                Ok(RemoteCommandOutput::from_status(status))
            }
            OutputMode::Silent => capture(&mut channel).await,
        }
    }

    /// Sends an SSH disconnect and releases the transport.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Channel`] when the disconnect cannot be sent.
    pub async fn close(self) -> Result<(), SessionError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|err| SessionError::Channel(err.to_string()))
    }
}

impl RemoteShell for Session {
    fn run<'a>(&'a mut self, command: &'a str, mode: OutputMode) -> ShellFuture<'a> {
        Box::pin(self.execute(command, mode))
    }
}

async fn relay_to<S, O, E>(
    source: &mut S,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<ExitStatus, SessionError>
where
    S: EventSource,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    relay(source, stdout, stderr, interrupt_signal()).await
}

async fn capture<S: EventSource>(source: &mut S) -> Result<RemoteCommandOutput, SessionError> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let status = relay_to(source, &mut stdout, &mut stderr).await?;
    Ok(RemoteCommandOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

/// Resolves on Ctrl-C; never resolves when the handler cannot be installed.
async fn interrupt_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::relay::ChannelEvent;
    use super::relay::scripted::ScriptedSource;
    use super::*;

    #[tokio::test]
    async fn silent_capture_keeps_output_off_the_terminal_and_keeps_status() {
        let mut source = ScriptedSource::new([
            ChannelEvent::Stdout(b"noise\n".to_vec()),
            ChannelEvent::Stderr(b"python: No module named tox\n".to_vec()),
            ChannelEvent::Exited(1),
            ChannelEvent::Closed,
        ]);

        let output = capture(&mut source).await.expect("capture should succeed");

        assert_eq!(output.status, ExitStatus::Exited(1));
        assert_eq!(output.stdout, "noise\n");
        assert_eq!(output.stderr, "python: No module named tox\n");
    }

    #[test]
    fn target_defaults_port_to_22() {
        let target = SessionTarget::new("test-host", None, Some("ci")).expect("valid target");
        assert_eq!(target.port, DEFAULT_SSH_PORT);
        assert_eq!(target.user, "ci");
        assert_eq!(target.hostname, "test-host");
    }

    #[test]
    fn target_trims_hostname_and_user() {
        let target =
            SessionTarget::new("  test-host ", Some(2222), Some(" ci ")).expect("valid target");
        assert_eq!(target.hostname, "test-host");
        assert_eq!(target.port, 2222);
        assert_eq!(target.user, "ci");
    }

    #[test]
    fn target_rejects_blank_hostname() {
        let err = SessionTarget::new("   ", None, Some("ci")).expect_err("blank host");
        assert!(matches!(err, SessionError::InvalidTarget(_)), "got {err:?}");
    }

    #[test]
    fn target_rejects_zero_port() {
        let err = SessionTarget::new("test-host", Some(0), Some("ci")).expect_err("zero port");
        assert!(matches!(err, SessionError::InvalidTarget(ref msg) if msg.contains("port")));
    }
}
