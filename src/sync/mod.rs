//! Mirrors the local project tree to the remote working directory with
//! `rsync`, and wraps the remote commands that run inside it.

use std::ffi::OsString;

use camino::Utf8Path;
use shell_escape::unix::escape;
use tracing::debug;

mod config;
mod remote_command;
mod types;
mod util;

pub use camino::Utf8PathBuf;
pub use config::{
    DEFAULT_EXCLUDES, DEFAULT_REMOTE_ROOT, SyncConfig, SyncConfigLoadError, SyncError,
};
pub use remote_command::{build_remote_command, create_workdir_command, write_file_command};
pub use types::{
    CommandOutput, CommandRunner, ProcessCommandRunner, RshOptions, StreamingCommandRunner,
    SyncDestination,
};
pub use util::expand_tilde;

/// Runs `rsync` to mirror a source tree to a [`SyncDestination`].
#[derive(Clone, Debug)]
pub struct Syncer<R: CommandRunner> {
    config: SyncConfig,
    runner: R,
}

impl Syncer<StreamingCommandRunner> {
    /// Convenience constructor that echoes `rsync` output to the terminal.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] when validation fails.
    pub fn with_streaming_runner(config: SyncConfig) -> Result<Self, SyncError> {
        Self::new(config, StreamingCommandRunner)
    }
}

impl<R: CommandRunner> Syncer<R> {
    /// Creates a new syncer using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: SyncConfig, runner: R) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Copies the contents of `source` into the destination directory.
    ///
    /// Only newer files are transferred and nothing is deleted remotely, so
    /// artefacts produced by earlier runs survive. Tox environments are never
    /// copied; `excludes` adds further rsync patterns.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingSource`] when the source directory is
    /// absent, or [`SyncError::CommandFailure`] if `rsync` returns a non-zero
    /// exit code.
    pub fn sync(
        &self,
        source: &Utf8Path,
        destination: &SyncDestination,
        excludes: &[String],
    ) -> Result<(), SyncError> {
        let args = self.build_rsync_args(source, destination, excludes)?;
        debug!(program = %self.config.rsync_bin, ?args, "synchronising project");
        let output = self.runner.run(&self.config.rsync_bin, &args)?;
        if output.is_success() {
            return Ok(());
        }

        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(SyncError::CommandFailure {
            program: self.config.rsync_bin.clone(),
            status: output.code,
            status_text,
            stderr: output.stderr,
        })
    }

    fn build_rsync_args(
        &self,
        source: &Utf8Path,
        destination: &SyncDestination,
        excludes: &[String],
    ) -> Result<Vec<OsString>, SyncError> {
        if !source.is_dir() {
            return Err(SyncError::MissingSource {
                path: source.to_path_buf(),
            });
        }

        let mut args = vec![OsString::from("-a"), OsString::from("--update")];
        let patterns = DEFAULT_EXCLUDES
            .iter()
            .copied()
            .chain(excludes.iter().map(String::as_str));
        for pattern in patterns {
            args.push(OsString::from("--exclude"));
            args.push(OsString::from(pattern));
        }

        match destination {
            SyncDestination::Remote {
                user,
                host,
                path,
                shell,
            } => {
                args.push(OsString::from("--rsh"));
                args.push(OsString::from(self.build_remote_shell(shell)));
                args.push(OsString::from(format!("{source}/")));
                args.push(OsString::from(format!("{user}@{host}:{path}")));
            }
            SyncDestination::Local { path } => {
                args.push(OsString::from(format!("{source}/")));
                args.push(OsString::from(path));
            }
        }

        Ok(args)
    }

    fn build_remote_shell(&self, options: &RshOptions) -> String {
        let mut parts = vec![
            self.config.ssh_bin.clone(),
            String::from("-p"),
            options.port.to_string(),
        ];

        if let Some(ref identity_file) = options.identity_file {
            parts.push(String::from("-i"));
            parts.push(escape(identity_file.as_str().into()).into_owned());
        }

        parts.push(String::from("-o"));
        parts.push(String::from("BatchMode=yes"));

        if !options.strict_host_key_checking {
            parts.push(String::from("-o"));
            parts.push(String::from("StrictHostKeyChecking=no"));
        }

        if let Some(ref known_hosts) = options.known_hosts_file
            && !known_hosts.trim().is_empty()
        {
            parts.push(String::from("-o"));
            let option = format!("UserKnownHostsFile={known_hosts}");
            parts.push(escape(option.into()).into_owned());
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests;
