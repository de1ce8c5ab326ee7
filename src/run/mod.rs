//! Orchestrates one remote tox run over an established session.
//!
//! The pipeline checks remote prerequisites, mirrors the local project into
//! the remote working directory, optionally installs system dependencies and
//! untoxes the configuration, then runs tox with live output. The tox exit
//! status is returned unchanged so callers can exit with it.

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::repo::RemoteWorkdir;
use crate::session::{ExitStatus, OutputMode, RemoteCommandOutput, RemoteShell, SessionError};
use crate::sync::{
    CommandRunner, SyncDestination, SyncError, Syncer, create_workdir_command, write_file_command,
};
use crate::untox::{UNTOX_FILE_NAME, untox};
use crate::workspace::{BINDEP_TXT, TOX_INI, Workspace, WorkspaceError};

mod command;
mod config;

pub use command::{
    BINDEP_PROBE, InvalidToxArgument, ToxInvocation, bindep_command, prerequisite_commands,
    validate_tox_args,
};
pub use config::ToxConfig;

/// Everything needed to run tox for one project.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunPlan {
    /// Local project directory.
    pub source: Utf8PathBuf,
    /// Remote directory that receives the project.
    pub workdir: RemoteWorkdir,
    /// Where rsync copies the project.
    pub destination: SyncDestination,
    /// Arguments forwarded to tox.
    pub tox_args: Vec<String>,
    /// Whether to strip package installation from the tox configuration.
    pub untox: bool,
    /// Extra rsync exclusion patterns.
    pub excludes: Vec<String>,
}

/// Errors surfaced while performing a remote run.
#[derive(Debug, Error)]
pub enum RunError {
    /// A required tool is missing on the remote host.
    #[error("remote prerequisite check `{command}` failed with status {code}: {stderr}")]
    PrerequisiteMissing {
        /// Probe command that failed.
        command: String,
        /// Exit code of the probe.
        code: i32,
        /// Stderr captured from the probe.
        stderr: String,
    },
    /// A preparatory remote command failed.
    #[error("remote setup command `{command}` failed with status {code}: {stderr}")]
    RemoteSetup {
        /// Command that failed.
        command: String,
        /// Exit code of the command.
        code: i32,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when workspace synchronisation fails.
    #[error("workspace sync failed: {0}")]
    Sync(#[from] SyncError),
    /// Raised when the SSH session fails.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Raised when a local project file cannot be read.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    /// Raised when a tox argument cannot be forwarded.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidToxArgument),
}

/// Executes the run pipeline with the provided syncer.
#[derive(Debug)]
pub struct RunOrchestrator<R: CommandRunner> {
    syncer: Syncer<R>,
    tox: ToxConfig,
}

impl<R: CommandRunner> RunOrchestrator<R> {
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(syncer: Syncer<R>, tox: ToxConfig) -> Self {
        Self { syncer, tox }
    }

    /// Runs the pipeline on `shell` and returns the tox exit status.
    ///
    /// A non-zero tox status is returned, not raised. A local interrupt
    /// during any remote step ends the run with [`ExitStatus::Interrupted`].
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when a prerequisite is missing, a setup command
    /// or the sync fails, a project file cannot be read, or the session
    /// breaks.
    pub async fn execute<S: RemoteShell>(
        &self,
        shell: &mut S,
        plan: &RunPlan,
    ) -> Result<ExitStatus, RunError> {
        validate_tox_args(&plan.tox_args)?;
        let workspace = Workspace::open(&plan.source)?;
        let untoxed = if plan.untox {
            Some(untox(&workspace.read(TOX_INI)?))
        } else {
            None
        };
        let workdir = plan.workdir.as_str();

        info!("checking remote prerequisites");
        for probe in prerequisite_commands(&self.tox.python_bin) {
            let output = shell.run(&probe, OutputMode::Silent).await?;
            if output.status == ExitStatus::Interrupted {
                return Ok(ExitStatus::Interrupted);
            }
            if !output.is_success() {
                return Err(RunError::PrerequisiteMissing {
                    command: probe,
                    code: output.status.code(),
                    stderr: output.stderr.trim().to_owned(),
                });
            }
        }

        if let Some(status) = run_setup(shell, create_workdir_command(workdir)).await? {
            return Ok(status);
        }

        info!(source = %plan.source, workdir, "synchronising project");
        self.syncer
            .sync(&plan.source, &plan.destination, &plan.excludes)?;

        if workspace.contains(BINDEP_TXT)?
            && let Some(status) = install_bindep(shell, workdir).await?
        {
            return Ok(status);
        }

        if let Some(ref rewritten) = untoxed {
            info!("untoxing test configuration");
            let upload = write_file_command(&plan.workdir.join(UNTOX_FILE_NAME), rewritten);
            if let Some(status) = run_setup(shell, upload).await? {
                return Ok(status);
            }
        }

        let invocation = ToxInvocation {
            python: &self.tox.python_bin,
            workdir,
            config_file: untoxed.as_ref().map(|_| UNTOX_FILE_NAME),
            install_project: untoxed.is_some(),
            args: &plan.tox_args,
        };
        let command = invocation.render()?;
        info!(%command, "running tox");
        let output = shell.run(&command, OutputMode::Echo).await?;
        Ok(output.status)
    }
}

/// Runs a silent setup command; returns a status only when interrupted.
async fn run_setup<S: RemoteShell>(
    shell: &mut S,
    command: String,
) -> Result<Option<ExitStatus>, RunError> {
    debug!(%command, "running remote setup command");
    let RemoteCommandOutput { status, stderr, .. } =
        shell.run(&command, OutputMode::Silent).await?;
    match status {
        ExitStatus::Interrupted => Ok(Some(status)),
        ExitStatus::Exited(0) => Ok(None),
        failed => Err(RunError::RemoteSetup {
            command,
            code: failed.code(),
            stderr: stderr.trim().to_owned(),
        }),
    }
}

/// Runs `bindep test` when the tool exists remotely. Failures are logged,
/// not raised.
async fn install_bindep<S: RemoteShell>(
    shell: &mut S,
    workdir: &str,
) -> Result<Option<ExitStatus>, RunError> {
    let probe = shell.run(BINDEP_PROBE, OutputMode::Silent).await?;
    match probe.status {
        ExitStatus::Interrupted => return Ok(Some(ExitStatus::Interrupted)),
        ref status if !status.success() => {
            debug!("bindep not installed remotely; skipping");
            return Ok(None);
        }
        _ => {}
    }

    info!("checking system dependencies with bindep");
    let output = shell.run(&bindep_command(workdir), OutputMode::Echo).await?;
    match output.status {
        ExitStatus::Interrupted => Ok(Some(ExitStatus::Interrupted)),
        ref status if !status.success() => {
            warn!(code = status.code(), "bindep reported missing packages");
            Ok(None)
        }
        _ => Ok(None),
    }
}
