//! SSH target configuration loaded via `ortho-config`.
//!
//! All three configuration structs share one `rtox.toml`. An explicit
//! `RTOX_CONFIG_PATH` wins; otherwise the nearest `.rtox.toml` or `rtox.toml`
//! in the project directory or any of its ancestors is used, and only then
//! the user's home and XDG locations.

use std::env;
use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::session::{
    AgentAuth, AuthChain, DEFAULT_SSH_PORT, HostKeyPolicy, IdentityFileAuth, SessionError,
    SessionTarget,
};
use crate::sync::{RshOptions, SyncDestination, expand_tilde};

/// Connection settings for the remote test host, merged from defaults,
/// configuration files, and environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "RTOX_SSH",
    discovery(
        app_name = "rtox",
        env_var = "RTOX_CONFIG_PATH",
        config_file_name = "rtox.toml",
        dotfile_name = ".rtox.toml",
        project_file_name = ".rtox.toml"
    )
)]
pub struct SshConfig {
    /// Remote host running the tests.
    #[ortho_config(default = "localhost".to_owned())]
    pub hostname: String,
    /// SSH port on the remote host.
    #[ortho_config(default = DEFAULT_SSH_PORT)]
    pub port: u16,
    /// Remote user; the local login name is used when unset.
    pub user: Option<String>,
    /// Private key used for authentication. Supports `~/` expansion.
    pub identity_file: Option<String>,
    /// Whether to offer the identities held by the running SSH agent.
    /// Enabled unless explicitly set to `false`.
    pub use_agent: Option<bool>,
    /// Whether the host key must appear in a `known_hosts` file.
    #[ortho_config(default = false)]
    pub strict_host_key_checking: bool,
    /// Known hosts file consulted when strict checking is enabled.
    pub known_hosts_file: Option<String>,
}

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "RTOX_CONFIG_PATH";

/// File names searched for in the project directory and its ancestors, in
/// order of preference.
pub const PROJECT_CONFIG_NAMES: &[&str] = &[".rtox.toml", "rtox.toml"];

/// Returns the nearest project configuration file at or above `start`.
#[must_use]
pub fn discover_project_config(start: &Utf8Path) -> Option<Utf8PathBuf> {
    start.ancestors().find_map(|dir| {
        PROJECT_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Builds the argument list handed to the `ortho-config` loaders for a run
/// started in `project`.
pub(crate) fn loader_args(project: &Utf8Path) -> Vec<OsString> {
    let mut args = vec![OsString::from("rtox")];
    if env::var_os(CONFIG_PATH_ENV).is_some_and(|value| !value.is_empty()) {
        return args;
    }
    if let Some(path) = discover_project_config(project) {
        debug!(%path, "using project configuration file");
        args.push(OsString::from("--config-path"));
        args.push(OsString::from(path.into_string()));
    }
    args
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to rtox.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

impl SshConfig {
    /// Loads configuration for a run started in `project`, picking up the
    /// nearest project configuration file above it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_for_project(project: &Utf8Path) -> Result<Self, ConfigError> {
        Self::load_from_iter(loader_args(project))
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Whether the SSH agent is offered during authentication.
    #[must_use]
    pub fn agent_enabled(&self) -> bool {
        self.use_agent.unwrap_or(true)
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and file key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required value is blank and
    /// [`ConfigError::Invalid`] when a value is out of range or no
    /// authentication strategy is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(FieldMetadata::new("remote hostname", "RTOX_SSH_HOSTNAME", "hostname")
                .missing());
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid(String::from(
                "port must be greater than zero",
            )));
        }
        Self::require_optional(
            self.user.as_deref(),
            &FieldMetadata::new("remote user", "RTOX_SSH_USER", "user"),
        )?;
        Self::require_optional(
            self.identity_file.as_deref(),
            &FieldMetadata::new("identity file", "RTOX_SSH_IDENTITY_FILE", "identity_file"),
        )?;
        Self::require_optional(
            self.known_hosts_file.as_deref(),
            &FieldMetadata::new(
                "known hosts file",
                "RTOX_SSH_KNOWN_HOSTS_FILE",
                "known_hosts_file",
            ),
        )?;
        if self.identity_file.is_none() && !self.agent_enabled() {
            return Err(ConfigError::Invalid(String::from(
                "no authentication method: set identity_file or enable use_agent",
            )));
        }
        Ok(())
    }

    fn require_optional(value: Option<&str>, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        match value {
            Some(v) if v.trim().is_empty() => Err(metadata.missing()),
            _ => Ok(()),
        }
    }

    /// Resolves the connection target, defaulting the user to the local one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTarget`] when the target is unusable.
    pub fn target(&self) -> Result<SessionTarget, SessionError> {
        SessionTarget::new(&self.hostname, Some(self.port), self.user.as_deref())
    }

    /// Returns the expanded identity file path, if one is configured.
    #[must_use]
    pub fn identity_path(&self) -> Option<Utf8PathBuf> {
        self.identity_file
            .as_deref()
            .map(|path| Utf8PathBuf::from(expand_tilde(path)))
    }

    /// Builds the authentication chain: identity file first, then the agent.
    #[must_use]
    pub fn authenticator(&self) -> AuthChain {
        let mut chain = AuthChain::new();
        if let Some(path) = self.identity_path() {
            chain = chain.with(IdentityFileAuth::new(path));
        }
        if self.agent_enabled() {
            chain = chain.with(AgentAuth);
        }
        chain
    }

    /// Returns the host key policy implied by the strictness settings.
    #[must_use]
    pub fn host_key_policy(&self) -> HostKeyPolicy {
        if !self.strict_host_key_checking {
            return HostKeyPolicy::AcceptAny;
        }
        HostKeyPolicy::KnownHosts {
            path: self
                .known_hosts_file
                .as_deref()
                .map(|path| Utf8PathBuf::from(expand_tilde(path))),
        }
    }

    /// Options for the `ssh` client that `rsync` spawns.
    #[must_use]
    pub fn rsh_options(&self) -> RshOptions {
        RshOptions {
            port: self.port,
            identity_file: self.identity_path(),
            strict_host_key_checking: self.strict_host_key_checking,
            known_hosts_file: self
                .known_hosts_file
                .as_deref()
                .map(expand_tilde)
                .or_else(|| (!self.strict_host_key_checking).then(|| String::from("/dev/null"))),
        }
    }

    /// Builds the rsync destination for `remote_path` on this host.
    #[must_use]
    pub fn sync_destination(&self, target: &SessionTarget, remote_path: &str) -> SyncDestination {
        SyncDestination::Remote {
            user: target.user.clone(),
            host: target.hostname.clone(),
            path: Utf8PathBuf::from(remote_path),
            shell: self.rsh_options(),
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
