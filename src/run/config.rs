//! Tox invocation settings.

use camino::Utf8Path;
use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::config::{ConfigError, loader_args};

/// Interpreter settings for the remote tox run, loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "RTOX_TOX",
    discovery(
        app_name = "rtox",
        env_var = "RTOX_CONFIG_PATH",
        config_file_name = "rtox.toml",
        dotfile_name = ".rtox.toml",
        project_file_name = ".rtox.toml"
    )
)]
pub struct ToxConfig {
    /// Python interpreter on the remote host used to launch tox and pip.
    #[ortho_config(default = "python".to_owned())]
    pub python_bin: String,
}

impl ToxConfig {
    /// Loads configuration from defaults, files, and environment variables
    /// for a run started in `project`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_for_project(project: &Utf8Path) -> Result<Self, ConfigError> {
        Self::load_from_iter(loader_args(project))
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Ensures the interpreter is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when `python_bin` is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.python_bin.trim().is_empty() {
            return Err(ConfigError::MissingField(String::from(
                "missing python interpreter: set RTOX_TOX_PYTHON_BIN or add python_bin to rtox.toml",
            )));
        }
        Ok(())
    }
}
