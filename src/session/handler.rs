//! Client event handler, responsible for host key decisions.

use camino::Utf8PathBuf;
use russh::client;
use russh::keys::PublicKey;
use tracing::warn;

/// How the server's host key is checked during the handshake.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum HostKeyPolicy {
    /// Accept any host key. Suits throwaway test machines.
    #[default]
    AcceptAny,
    /// Require the key to be listed in an OpenSSH `known_hosts` file.
    KnownHosts {
        /// Explicit file to consult; the user's default file when `None`.
        path: Option<Utf8PathBuf>,
    },
}

/// `russh` client handler carrying the host key policy for one connection.
#[derive(Debug)]
pub struct ClientHandler {
    policy: HostKeyPolicy,
    host: String,
    port: u16,
}

impl ClientHandler {
    pub(crate) const fn new(policy: HostKeyPolicy, host: String, port: u16) -> Self {
        Self { policy, host, port }
    }
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let lookup = match &self.policy {
            HostKeyPolicy::AcceptAny => return Ok(true),
            HostKeyPolicy::KnownHosts { path: None } => {
                russh::keys::check_known_hosts(&self.host, self.port, server_public_key)
            }
            HostKeyPolicy::KnownHosts { path: Some(path) } => russh::keys::check_known_hosts_path(
                &self.host,
                self.port,
                server_public_key,
                path,
            ),
        };

        match lookup {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(host = %self.host, port = self.port, "host key is not in known_hosts");
                Ok(false)
            }
            Err(err) => {
                warn!(host = %self.host, port = self.port, error = %err, "host key verification failed");
                Ok(false)
            }
        }
    }
}
