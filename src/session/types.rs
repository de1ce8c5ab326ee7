//! Value types shared by the session runner and its callers.

/// Exit code reported for a command interrupted locally.
pub const INTERRUPTED_EXIT_CODE: i32 = 1;

/// Exit code used when the remote status cannot be represented locally.
pub const UNKNOWN_EXIT_CODE: i32 = 255;

/// Controls whether remote output is relayed to the local terminal.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputMode {
    /// Forward stdout and stderr to the matching local streams as they arrive.
    #[default]
    Echo,
    /// Write nothing locally; output is captured for diagnostics only.
    Silent,
}

/// Final status of one remote command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitStatus {
    /// The remote process exited with the given status.
    Exited(u32),
    /// The remote process was terminated by a signal.
    Signalled {
        /// Signal name as reported by the server.
        signal: String,
        /// Shell-style exit code (`128 + signal number`).
        code: i32,
    },
    /// The local user interrupted the command before it completed.
    Interrupted,
}

impl ExitStatus {
    /// Returns the code the local process should exit with.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Exited(code) => i32::try_from(*code).unwrap_or(UNKNOWN_EXIT_CODE),
            Self::Signalled { code, .. } => *code,
            Self::Interrupted => INTERRUPTED_EXIT_CODE,
        }
    }

    /// Returns `true` when the remote command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

/// Outcome of a remote command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommandOutput {
    /// Status reported by the remote side.
    pub status: ExitStatus,
    /// Captured standard output; only populated in [`OutputMode::Silent`].
    pub stdout: String,
    /// Captured standard error; only populated in [`OutputMode::Silent`].
    pub stderr: String,
}

impl RemoteCommandOutput {
    /// Builds an output with no captured text.
    #[must_use]
    pub const fn from_status(status: ExitStatus) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Returns `true` when the remote command exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.success()
    }
}
