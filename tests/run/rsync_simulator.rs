//! Minimal rsync stand-in for orchestrator tests.
//!
//! Understands the subset of arguments the syncer emits for local
//! destinations: `--exclude PATTERN` (exact names or `*suffix` globs), the
//! trailing-slash source, and the destination. Files are copied without
//! deleting anything already present at the destination.

use std::fs::{copy, create_dir_all, read_dir};

use camino::{Utf8Path, Utf8PathBuf};
use rtox::SyncError;

#[derive(Debug, Default)]
pub struct RsyncInvocation {
    pub excludes: Vec<String>,
    pub source: Utf8PathBuf,
    pub destination: Utf8PathBuf,
}

pub fn parse_args(args: &[String]) -> Result<RsyncInvocation, SyncError> {
    let mut excludes = Vec::new();
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--exclude" => {
                let pattern = iter.next().ok_or_else(|| failure("--exclude needs a value"))?;
                excludes.push(pattern.clone());
            }
            "--rsh" => return Err(failure("remote destinations are not simulated")),
            flag if flag.starts_with('-') => {}
            path => positional.push(Utf8PathBuf::from(path)),
        }
    }

    let [source, destination] = <[Utf8PathBuf; 2]>::try_from(positional)
        .map_err(|_| failure("expected a source and a destination"))?;
    Ok(RsyncInvocation {
        excludes,
        source,
        destination,
    })
}

pub fn simulate(invocation: &RsyncInvocation) -> Result<(), SyncError> {
    create_dir_all(&invocation.destination).map_err(io_failure)?;
    copy_tree(
        &invocation.source,
        &invocation.destination,
        &invocation.excludes,
    )
}

fn is_excluded(name: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|pattern| {
        let trimmed = pattern.trim_end_matches('/');
        trimmed
            .strip_prefix('*')
            .map_or(name == trimmed, |suffix| name.ends_with(suffix))
    })
}

fn copy_tree(source: &Utf8Path, destination: &Utf8Path, excludes: &[String]) -> Result<(), SyncError> {
    for entry in read_dir(source).map_err(io_failure)? {
        let entry = entry.map_err(io_failure)?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(|_| failure("non-UTF-8 path in fixture"))?;
        let Some(name) = path.file_name() else {
            continue;
        };
        if is_excluded(name, excludes) {
            continue;
        }

        let target = destination.join(name);
        if entry.file_type().map_err(io_failure)?.is_dir() {
            create_dir_all(&target).map_err(io_failure)?;
            copy_tree(&path, &target, excludes)?;
        } else {
            copy(&path, &target).map_err(io_failure)?;
        }
    }
    Ok(())
}

fn failure(message: &str) -> SyncError {
    SyncError::Spawn {
        program: String::from("rsync"),
        message: message.to_owned(),
    }
}

fn io_failure(err: std::io::Error) -> SyncError {
    failure(&err.to_string())
}
