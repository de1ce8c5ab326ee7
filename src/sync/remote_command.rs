//! Remote command wrapping for the project working directory.
//!
//! Every command that touches the synchronised tree runs from the remote
//! working directory. This module centralises the string-building so that
//! paths are always shell-escaped the same way.

use shell_escape::unix::escape;

/// Prefixes `remote_command` with a change into `workdir`.
///
/// The directory is shell-escaped; `remote_command` is passed through
/// verbatim and must already be safe for the remote shell.
#[must_use]
pub fn build_remote_command(workdir: &str, remote_command: &str) -> String {
    let escaped_path = escape(workdir.into());
    format!("cd {escaped_path} && {remote_command}")
}

/// Builds a command that creates `workdir` and any missing parents.
#[must_use]
pub fn create_workdir_command(workdir: &str) -> String {
    let escaped_path = escape(workdir.into());
    format!("mkdir -p {escaped_path}")
}

/// Builds a command that writes `contents` verbatim to `path`, replacing any
/// existing file.
#[must_use]
pub fn write_file_command(path: &str, contents: &str) -> String {
    let escaped_path = escape(path.into());
    let escaped_contents = escape(contents.into());
    format!("printf '%s' {escaped_contents} > {escaped_path}")
}
