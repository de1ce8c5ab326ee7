//! Core library for the rtox remote tox runner.
//!
//! The crate mirrors a local project to a remote host, runs its tox suite
//! there over a single SSH session, and relays the output and exit status
//! back. [`session`] holds the SSH runner, [`run`] the pipeline that drives
//! it, and [`sync`] the rsync and subprocess plumbing.

pub mod config;
pub mod logging;
pub mod repo;
pub mod run;
pub mod session;
pub mod sync;
pub mod test_support;
pub mod untox;
pub mod workspace;

pub use config::{ConfigError, SshConfig};
pub use repo::{RemoteWorkdir, RepoError, RepoIdentity, RepoResolver};
pub use run::{RunError, RunOrchestrator, RunPlan, ToxConfig};
pub use session::{
    ExitStatus, HostKeyPolicy, OutputMode, RemoteCommandOutput, RemoteShell, Session,
    SessionError, SessionTarget,
};
pub use sync::{
    CommandOutput, CommandRunner, ProcessCommandRunner, StreamingCommandRunner, SyncConfig,
    SyncDestination, SyncError, Syncer,
};
