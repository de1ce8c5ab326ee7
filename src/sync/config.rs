//! Synchronisation configuration structures and validation.
//!
//! This module defines [`SyncConfig`] for the local tooling used to mirror the
//! project, along with associated error types. Configuration is loaded via
//! `ortho-config` which merges defaults, configuration files, and environment
//! variables.

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::config::loader_args;

/// Default directory, relative to the remote login directory, that holds one
/// working copy per project.
pub const DEFAULT_REMOTE_ROOT: &str = ".rtox";

/// Paths never mirrored to the remote host. Tox environments are host
/// specific and would break when copied.
pub const DEFAULT_EXCLUDES: &[&str] = &[".tox"];

/// Local tooling settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "RTOX_SYNC",
    discovery(
        app_name = "rtox",
        env_var = "RTOX_CONFIG_PATH",
        config_file_name = "rtox.toml",
        dotfile_name = ".rtox.toml",
        project_file_name = ".rtox.toml"
    )
)]
pub struct SyncConfig {
    /// Path to the `rsync` executable.
    #[ortho_config(default = "rsync".to_owned())]
    pub rsync_bin: String,
    /// Path to the `ssh` executable used by `rsync` as its remote shell.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `git` executable used to identify the project.
    #[ortho_config(default = "git".to_owned())]
    pub git_bin: String,
    /// Remote directory that receives per-project working copies.
    #[ortho_config(default = DEFAULT_REMOTE_ROOT.to_owned())]
    pub remote_root: String,
}

/// Errors raised when loading the sync configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SyncConfigLoadError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("sync configuration parsing failed: {0}")]
    Parse(String),
}

impl SyncConfig {
    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] when any required field is empty.
    pub fn validate(&self) -> Result<(), SyncError> {
        Self::require_value(&self.rsync_bin, "rsync_bin")?;
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.git_bin, "git_bin")?;
        Self::require_value(&self.remote_root, "remote_root")?;
        Ok(())
    }

    /// Loads configuration using defaults, configuration files, and
    /// environment variables for a run started in `project`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncConfigLoadError::Parse`] when merging sources fails.
    pub fn load_for_project(project: &Utf8Path) -> Result<Self, SyncConfigLoadError> {
        Self::load_from_iter(loader_args(project))
            .map_err(|err| SyncConfigLoadError::Parse(err.to_string()))
    }

    fn require_value(value: &str, field: &str) -> Result<(), SyncError> {
        if value.trim().is_empty() {
            return Err(SyncError::InvalidConfig {
                field: field.to_owned(),
            });
        }
        Ok(())
    }
}

/// Errors surfaced while performing synchronisation or running local tools.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SyncError {
    /// Raised when configuration is missing required values. The error message
    /// includes guidance on how to provide the value via environment variable
    /// or configuration file.
    #[error("missing {field}: set RTOX_SYNC_{env_suffix} or add {field} to rtox.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when the source directory does not exist.
    #[error("sync source directory missing: {path}")]
    MissingSource {
        /// Path that was expected to be synchronised.
        path: Utf8PathBuf,
    },
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a local tool completes with a non-zero exit code.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Command name used for the attempted operation.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
}
