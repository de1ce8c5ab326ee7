//! Error types for remote sessions.

use thiserror::Error;

/// Errors raised while establishing or using a remote session.
///
/// A remote command that exits with a non-zero status is not an error; it is
/// reported through [`super::ExitStatus`]. These variants describe failures of
/// the transport or of the local side of the relay.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// Raised when the connection target is unusable before dialling.
    #[error("invalid session target: {0}")]
    InvalidTarget(String),
    /// Raised when the host cannot be reached or rejects the handshake.
    #[error("failed to connect to {host}:{port}: {message}")]
    Connect {
        /// Host that was dialled.
        host: String,
        /// Port that was dialled.
        port: u16,
        /// Underlying transport error.
        message: String,
    },
    /// Raised when none of the configured identities was accepted.
    #[error("authentication as {user} failed: {message}")]
    Auth {
        /// Remote user name.
        user: String,
        /// Description of the rejected strategies.
        message: String,
    },
    /// Raised when an execution channel cannot be opened or started.
    #[error("failed to start remote command: {0}")]
    Channel(String),
    /// Raised when the transport drops before the command reports a status.
    #[error("connection to the remote host was lost before the command finished")]
    ConnectionLost,
    /// Raised when relaying output to a local stream fails.
    #[error("failed to write remote output locally: {0}")]
    LocalIo(String),
}

impl SessionError {
    pub(crate) fn local_io(err: &std::io::Error) -> Self {
        Self::LocalIo(err.to_string())
    }
}
