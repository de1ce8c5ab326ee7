//! Repository identity and the remote working directory derived from it.
//!
//! A project is identified by its git fetch URL so that every clone of the
//! same repository shares one remote working copy. Projects without a remote
//! fall back to their canonical local path.

use std::ffi::OsString;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{debug, warn};

use crate::sync::CommandRunner;

/// Where a [`RepoIdentity`] came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdentitySource {
    /// Fetch URL reported by `git remote --verbose`.
    GitRemote,
    /// Canonical path of the local source directory.
    LocalPath,
}

/// Stable identity of a local project.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RepoIdentity {
    value: String,
    source: IdentitySource,
}

impl RepoIdentity {
    /// Returns the identity text that is hashed into the working directory.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns how the identity was obtained.
    #[must_use]
    pub const fn source(&self) -> IdentitySource {
        self.source
    }

    /// Lowercase hex SHA-1 digest of the identity.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha1::digest(self.value.as_bytes()))
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Remote directory that holds the mirrored project.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteWorkdir(Utf8PathBuf);

impl RemoteWorkdir {
    /// Builds `<remote_root>/<digest>` for `identity`.
    #[must_use]
    pub fn new(remote_root: &str, identity: &RepoIdentity) -> Self {
        let root = remote_root.trim_end_matches('/');
        let digest = identity.digest();
        if root.is_empty() {
            return Self(Utf8PathBuf::from(format!("/{digest}")));
        }
        Self(Utf8PathBuf::from(format!("{root}/{digest}")))
    }

    /// Uses `path` as the working directory verbatim.
    #[must_use]
    pub fn at(path: impl Into<Utf8PathBuf>) -> Self {
        Self(path.into())
    }

    /// Returns the directory as text suitable for remote commands.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns `name` joined onto the working directory.
    #[must_use]
    pub fn join(&self, name: &str) -> String {
        self.0.join(name).into_string()
    }
}

impl fmt::Display for RemoteWorkdir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Errors raised while identifying the local project.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RepoError {
    /// The source directory could not be resolved to a canonical path.
    #[error("failed to resolve project directory {path}: {message}")]
    Canonicalize {
        /// Path that was supplied.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
}

/// Resolves project identities with `git`.
#[derive(Clone, Debug)]
pub struct RepoResolver<R: CommandRunner> {
    git_bin: String,
    runner: R,
}

impl<R: CommandRunner> RepoResolver<R> {
    /// Creates a resolver that invokes `git_bin` through `runner`.
    #[must_use]
    pub fn new(git_bin: impl Into<String>, runner: R) -> Self {
        Self {
            git_bin: git_bin.into(),
            runner,
        }
    }

    /// Returns the identity of the project rooted at `source`.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Canonicalize`] when `source` cannot be resolved.
    /// Git failures are not errors: they trigger the path fallback.
    pub fn resolve(&self, source: &Utf8Path) -> Result<RepoIdentity, RepoError> {
        let canonical = source
            .canonicalize_utf8()
            .map_err(|err| RepoError::Canonicalize {
                path: source.to_path_buf(),
                message: err.to_string(),
            })?;

        if let Some(url) = self.fetch_url(&canonical) {
            debug!(%url, "identified project by git remote");
            return Ok(RepoIdentity {
                value: url,
                source: IdentitySource::GitRemote,
            });
        }

        warn!(
            path = %canonical,
            "no git remote found; identifying project by its local path"
        );
        Ok(RepoIdentity {
            value: canonical.into_string(),
            source: IdentitySource::LocalPath,
        })
    }

    fn fetch_url(&self, source: &Utf8Path) -> Option<String> {
        let args = [
            OsString::from("-C"),
            OsString::from(source.as_str()),
            OsString::from("remote"),
            OsString::from("--verbose"),
        ];
        match self.runner.run(&self.git_bin, &args) {
            Ok(output) if output.is_success() => parse_fetch_url(&output.stdout),
            Ok(output) => {
                debug!(code = ?output.code, stderr = %output.stderr.trim(), "git remote failed");
                None
            }
            Err(err) => {
                debug!(error = %err, "git unavailable");
                None
            }
        }
    }
}

/// Extracts the URL of the first `(fetch)` remote from `git remote --verbose`
/// output, falling back to the first listed URL.
#[must_use]
pub fn parse_fetch_url(output: &str) -> Option<String> {
    let remotes: Vec<(&str, Option<&str>)> = output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _name = fields.next()?;
            let url = fields.next()?;
            Some((url, fields.next()))
        })
        .collect();

    remotes
        .iter()
        .find(|(_, kind)| *kind == Some("(fetch)"))
        .or_else(|| remotes.first())
        .map(|(url, _)| (*url).to_owned())
}
