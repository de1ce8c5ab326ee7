//! Pluggable authentication strategies.
//!
//! Only key-based identities are supported: a private key file on disk or
//! the keys held by a running SSH agent. Passwords are never handled.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use camino::Utf8PathBuf;
use russh::client::Handle;
use russh::keys::agent::AgentIdentity;
use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKeyWithHashAlg, PublicKey};
use tracing::debug;

use super::error::SessionError;
use super::handler::ClientHandler;

/// Future returned by [`Authenticator::authenticate`].
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = Result<bool, SessionError>> + Send + 'a>>;

/// Strategy that proves the local identity to the server.
pub trait Authenticator {
    /// Attempts authentication as `user`, resolving to `true` when accepted.
    ///
    /// A rejected identity resolves to `Ok(false)`; errors are reserved for
    /// strategies that cannot run at all (unreadable key, unreachable agent,
    /// transport failure).
    fn authenticate<'a>(
        &'a self,
        handle: &'a mut Handle<ClientHandler>,
        user: &'a str,
    ) -> AuthFuture<'a>;

    /// Short name used in diagnostics.
    fn describe(&self) -> String;
}

/// Authenticates with an unencrypted private key file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IdentityFileAuth {
    path: Utf8PathBuf,
}

impl IdentityFileAuth {
    /// Uses the private key stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Authenticator for IdentityFileAuth {
    fn authenticate<'a>(
        &'a self,
        handle: &'a mut Handle<ClientHandler>,
        user: &'a str,
    ) -> AuthFuture<'a> {
        Box::pin(async move {
            let key = russh::keys::load_secret_key(&self.path, None).map_err(|err| {
                SessionError::Auth {
                    user: user.to_owned(),
                    message: format!("cannot load identity file {}: {err}", self.path),
                }
            })?;
            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .map_err(|err| auth_error(user, &err))?
                .flatten();
            let result = handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                .await
                .map_err(|err| auth_error(user, &err))?;
            Ok(result.success())
        })
    }

    fn describe(&self) -> String {
        format!("identity file {}", self.path)
    }
}

/// Authenticates with each identity offered by the agent at `SSH_AUTH_SOCK`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AgentAuth;

impl Authenticator for AgentAuth {
    fn authenticate<'a>(
        &'a self,
        handle: &'a mut Handle<ClientHandler>,
        user: &'a str,
    ) -> AuthFuture<'a> {
        Box::pin(async move {
            let mut agent = AgentClient::connect_env()
                .await
                .map_err(|err| auth_error(user, &err))?;
            let identities = agent
                .request_identities()
                .await
                .map_err(|err| auth_error(user, &err))?;
            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .map_err(|err| auth_error(user, &err))?
                .flatten();

            for identity in &identities {
                let result = handle
                    .authenticate_publickey_with(user, offered_key(identity), hash_alg, &mut agent)
                    .await
                    .map_err(|err| auth_error(user, &err))?;
                if result.success() {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    fn describe(&self) -> String {
        String::from("ssh-agent")
    }
}

/// Public key offered to the server for an agent identity. Certificates are
/// offered as their underlying key.
fn offered_key(identity: &AgentIdentity) -> PublicKey {
    identity.public_key().into_owned()
}

/// Tries each strategy in order until one is accepted.
///
/// Errors from individual strategies are collected rather than returned, so
/// a missing agent does not prevent a key file from being tried.
#[derive(Default)]
pub struct AuthChain {
    strategies: Vec<Box<dyn Authenticator + Send + Sync>>,
}

impl AuthChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a strategy to the chain.
    #[must_use]
    pub fn with(mut self, strategy: impl Authenticator + Send + Sync + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Returns `true` when the chain holds no strategies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Returns the names of the configured strategies.
    #[must_use]
    pub fn describe_all(&self) -> Vec<String> {
        self.strategies.iter().map(|strategy| strategy.describe()).collect()
    }
}

impl std::fmt::Debug for AuthChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthChain")
            .field("strategies", &self.describe_all())
            .finish()
    }
}

impl Authenticator for AuthChain {
    fn authenticate<'a>(
        &'a self,
        handle: &'a mut Handle<ClientHandler>,
        user: &'a str,
    ) -> AuthFuture<'a> {
        Box::pin(async move {
            let mut failures = Vec::new();
            for strategy in &self.strategies {
                match strategy.authenticate(handle, user).await {
                    Ok(true) => {
                        debug!(strategy = %strategy.describe(), "authenticated");
                        return Ok(true);
                    }
                    Ok(false) => failures.push(format!("{}: rejected", strategy.describe())),
                    Err(err) => failures.push(format!("{}: {err}", strategy.describe())),
                }
            }

            if failures.is_empty() {
                return Err(SessionError::Auth {
                    user: user.to_owned(),
                    message: String::from("no authentication strategy configured"),
                });
            }
            Err(SessionError::Auth {
                user: user.to_owned(),
                message: failures.join("; "),
            })
        })
    }

    fn describe(&self) -> String {
        self.describe_all().join(", ")
    }
}

fn auth_error(user: &str, err: &impl std::fmt::Display) -> SessionError {
    SessionError::Auth {
        user: user.to_owned(),
        message: err.to_string(),
    }
}
