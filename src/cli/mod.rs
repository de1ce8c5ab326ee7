//! Command-line interface definitions for the `rtox` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `rtox` binary.
#[derive(Debug, Parser)]
#[command(
    name = "rtox",
    version,
    about = "Run a project's tox suite on a remote host over SSH",
    long_about = "Mirrors the current project to a remote host with rsync, runs tox \
                  there with live output, and exits with tox's exit status. \
                  Connection and tooling settings come from rtox.toml and \
                  RTOX_* environment variables. Everything that is not an \
                  rtox option is passed to tox; --untox is recognised anywhere \
                  on the command line."
)]
pub(crate) struct Cli {
    /// Strip package installation from tox environments and test against
    /// the remote system packages instead.
    #[arg(long)]
    pub(crate) untox: bool,
    /// Extra rsync exclusion pattern; may be repeated. `.tox` is always
    /// excluded.
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub(crate) excludes: Vec<String>,
    /// Arguments passed through to tox (use -- to separate them).
    #[arg(
        value_name = "TOX_ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub(crate) tox_args: Vec<String>,
}
