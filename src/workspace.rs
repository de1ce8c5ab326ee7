//! Read-only access to files in the local project directory.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Tox configuration file name.
pub const TOX_INI: &str = "tox.ini";

/// System dependency manifest consumed by `bindep`.
pub const BINDEP_TXT: &str = "bindep.txt";

/// Errors raised while reading project files.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WorkspaceError {
    /// A required file does not exist in the project.
    #[error("{name} not found in {root}")]
    Missing {
        /// Project directory that was searched.
        root: Utf8PathBuf,
        /// File name that was expected.
        name: String,
    },
    /// The project directory or a file could not be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that failed.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
}

/// Capability handle on the local project directory.
#[derive(Debug)]
pub struct Workspace {
    root: Utf8PathBuf,
    dir: Dir,
}

impl Workspace {
    /// Opens `root` for reading.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when the directory cannot be opened.
    pub fn open(root: &Utf8Path) -> Result<Self, WorkspaceError> {
        let dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| {
            WorkspaceError::Io {
                path: root.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            dir,
        })
    }

    /// Returns whether `name` exists in the project directory.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when existence cannot be determined.
    pub fn contains(&self, name: &str) -> Result<bool, WorkspaceError> {
        self.dir
            .try_exists(name)
            .map_err(|err| self.io_error(name, &err))
    }

    /// Reads `name` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Missing`] when the file is absent and
    /// [`WorkspaceError::Io`] for any other read failure.
    pub fn read(&self, name: &str) -> Result<String, WorkspaceError> {
        match self.dir.read_to_string(name) {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(WorkspaceError::Missing {
                root: self.root.clone(),
                name: name.to_owned(),
            }),
            Err(err) => Err(self.io_error(name, &err)),
        }
    }

    fn io_error(&self, name: &str, err: &io::Error) -> WorkspaceError {
        WorkspaceError::Io {
            path: self.root.join(name),
            message: err.to_string(),
        }
    }
}
