//! Remote command lines issued by the run pipeline.

use std::borrow::Cow;

use shell_escape::unix::escape;
use thiserror::Error;

use crate::sync::build_remote_command;

/// Command that reports whether `bindep` is installed remotely.
pub const BINDEP_PROBE: &str = "which bindep";

/// A tox argument that cannot be forwarded to the remote shell.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("tox argument {argument:?} contains a control character")]
pub struct InvalidToxArgument {
    /// Offending argument.
    pub argument: String,
}

/// Rejects arguments carrying control characters, which cannot be passed
/// through a remote shell command line faithfully.
///
/// # Errors
///
/// Returns [`InvalidToxArgument`] naming the first offending argument.
pub fn validate_tox_args(args: &[String]) -> Result<(), InvalidToxArgument> {
    match args.iter().find(|arg| arg.chars().any(char::is_control)) {
        Some(argument) => Err(InvalidToxArgument {
            argument: argument.clone(),
        }),
        None => Ok(()),
    }
}

fn quote(value: &str) -> Cow<'_, str> {
    escape(value.into())
}

/// Probes run before any other remote work.
#[must_use]
pub fn prerequisite_commands(python: &str) -> Vec<String> {
    let interpreter = quote(python);
    ["virtualenv", "tox"]
        .iter()
        .map(|module| format!("{interpreter} -m {module} --version"))
        .collect()
}

/// Runs `bindep test` from the working directory.
#[must_use]
pub fn bindep_command(workdir: &str) -> String {
    build_remote_command(workdir, "bindep test")
}

/// Options for the final tox invocation.
#[derive(Clone, Copy, Debug)]
pub struct ToxInvocation<'a> {
    /// Remote interpreter.
    pub python: &'a str,
    /// Remote working directory.
    pub workdir: &'a str,
    /// Alternate configuration file, relative to the working directory.
    pub config_file: Option<&'a str>,
    /// Whether to install the project without dependencies first.
    pub install_project: bool,
    /// Arguments forwarded to tox.
    pub args: &'a [String],
}

impl ToxInvocation<'_> {
    /// Renders the full remote command line.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidToxArgument`] when an argument contains a control
    /// character.
    pub fn render(&self) -> Result<String, InvalidToxArgument> {
        validate_tox_args(self.args)?;
        let interpreter = quote(self.python);

        let mut tox = format!("PY_COLORS=1 {interpreter} -m tox");
        if let Some(config_file) = self.config_file {
            tox.push_str(" -c ");
            tox.push_str(&quote(config_file));
        }
        for arg in self.args {
            tox.push(' ');
            tox.push_str(&quote(arg));
        }

        // A failed editable install is reported but tox still decides the
        // exit status.
        let command = if self.install_project {
            format!("{{ {interpreter} -m pip install --no-deps -e .; {tox}; }}")
        } else {
            tox
        };
        Ok(build_remote_command(self.workdir, &command))
    }
}
