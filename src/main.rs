//! Binary entry point for the rtox CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing::{debug, info};

use rtox::run::{InvalidToxArgument, validate_tox_args};
use rtox::{
    ConfigError, ProcessCommandRunner, RemoteWorkdir, RepoError, RepoResolver, RunError,
    RunOrchestrator, RunPlan, Session, SessionError, SshConfig, SyncConfig, SyncError, Syncer,
    ToxConfig, logging,
};

mod cli;

use cli::Cli;

const CONFIG_EXIT_CODE: i32 = 2;
const PREREQUISITE_EXIT_CODE: i32 = 3;
const SYNC_EXIT_CODE: i32 = 4;
const CONNECTION_EXIT_CODE: i32 = 255;
const FAILURE_EXIT_CODE: i32 = 1;

const UNTOX_FLAG: &str = "--untox";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid tox argument: {0}")]
    InvalidArgument(#[from] InvalidToxArgument),
    #[error("failed to identify project: {0}")]
    Repo(#[from] RepoError),
    #[error("failed to connect: {0}")]
    Connect(#[from] SessionError),
    #[error(transparent)]
    Run(#[from] RunError),
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl CliError {
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_)
            | Self::InvalidArgument(_)
            | Self::Run(RunError::InvalidArgument(_)) => CONFIG_EXIT_CODE,
            Self::Run(RunError::PrerequisiteMissing { .. }) => PREREQUISITE_EXIT_CODE,
            Self::Run(RunError::Sync(_)) => SYNC_EXIT_CODE,
            Self::Connect(_) | Self::Run(RunError::Session(_)) => CONNECTION_EXIT_CODE,
            Self::Repo(_) | Self::Run(RunError::RemoteSetup { .. } | RunError::Workspace(_)) => {
                FAILURE_EXIT_CODE
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = accept_trailing_untox(Cli::parse());
    logging::init();

    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            err.exit_code()
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    #[cfg(feature = "test-backdoors")]
    if let Some(result) = backdoors::fake_run_from_env(&cli) {
        return result;
    }

    validate_tox_args(&cli.tox_args)?;

    let source = current_dir()?;
    let ssh_config = SshConfig::load_for_project(&source)?;
    ssh_config.validate()?;
    let sync_config = SyncConfig::load_for_project(&source)
        .map_err(|err| CliError::Config(err.to_string()))?;
    let tox_config = ToxConfig::load_for_project(&source)?;
    tox_config.validate()?;

    let resolver = RepoResolver::new(sync_config.git_bin.clone(), ProcessCommandRunner);
    let identity = resolver.resolve(&source)?;
    let workdir = RemoteWorkdir::new(&sync_config.remote_root, &identity);
    debug!(%identity, %workdir, "resolved remote working directory");

    let syncer = Syncer::with_streaming_runner(sync_config).map_err(sync_config_error)?;
    let target = ssh_config
        .target()
        .map_err(|err| CliError::Config(err.to_string()))?;

    let mut session = Session::connect(
        &target,
        ssh_config.host_key_policy(),
        &ssh_config.authenticator(),
    )
    .await?;

    let plan = RunPlan {
        destination: ssh_config.sync_destination(&target, workdir.as_str()),
        source,
        workdir,
        tox_args: cli.tox_args,
        untox: cli.untox,
        excludes: cli.excludes,
    };
    let orchestrator = RunOrchestrator::new(syncer, tox_config);
    let outcome = orchestrator.execute(&mut session, &plan).await;

    if let Err(err) = session.close().await {
        debug!(error = %err, "failed to close SSH session cleanly");
    }

    let status = outcome?;
    info!(code = status.code(), "tox finished");
    Ok(status.code())
}

/// Treats `--untox` among the tox arguments as the rtox flag, so it may
/// appear anywhere on the command line.
fn accept_trailing_untox(mut cli: Cli) -> Cli {
    let forwarded = cli.tox_args.len();
    cli.tox_args.retain(|arg| arg != UNTOX_FLAG);
    cli.untox |= cli.tox_args.len() != forwarded;
    cli
}

fn current_dir() -> Result<Utf8PathBuf, CliError> {
    let cwd = std::env::current_dir().map_err(|err| CliError::Config(err.to_string()))?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|path| {
        CliError::Config(format!(
            "project directory is not valid UTF-8: {}",
            path.display()
        ))
    })
}

fn sync_config_error(err: SyncError) -> CliError {
    CliError::Config(err.to_string())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "rtox: {err}").ok();
}

#[cfg(feature = "test-backdoors")]
mod backdoors {
    //! Environment-driven fakes used by the CLI behaviour tests.

    use std::env;
    use std::io::{self, Write};

    use rtox::RunError;
    use rtox::sync::{SyncError, Utf8PathBuf};

    use super::{Cli, CliError};

    pub(super) fn fake_run_from_env(cli: &Cli) -> Option<Result<i32, CliError>> {
        if env::var("RTOX_FAKE_RUN_ENABLE").ok().as_deref() != Some("1") {
            return None;
        }
        if let Some(err) = prefail_from_env() {
            return Some(Err(err));
        }
        let mode = env::var("RTOX_FAKE_RUN_MODE").ok()?;
        match mode.as_str() {
            "exit-0" => Some(emit_fake_output(0)),
            "exit-7" => Some(emit_fake_output(7)),
            "echo-args" => {
                writeln!(
                    io::stdout(),
                    "untox={} excludes={:?} tox_args={:?}",
                    cli.untox,
                    cli.excludes,
                    cli.tox_args
                )
                .ok();
                Some(Ok(0))
            }
            _ => None,
        }
    }

    fn emit_fake_output(code: i32) -> Result<i32, CliError> {
        writeln!(io::stdout(), "fake-stdout").ok();
        writeln!(io::stderr(), "fake-stderr").ok();
        Ok(code)
    }

    fn prefail_from_env() -> Option<CliError> {
        let mode = env::var("RTOX_FAKE_RUN_PREFAIL").ok()?;
        match mode.as_str() {
            "config" => Some(CliError::Config(String::from("fake"))),
            "prerequisite" => Some(CliError::Run(RunError::PrerequisiteMissing {
                command: String::from("python -m tox --version"),
                code: 1,
                stderr: String::from("No module named tox"),
            })),
            "sync" => Some(CliError::Run(RunError::Sync(SyncError::MissingSource {
                path: Utf8PathBuf::from("fake"),
            }))),
            "connect" => Some(CliError::Connect(rtox::SessionError::ConnectionLost)),
            _ => None,
        }
    }
}
