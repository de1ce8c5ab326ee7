//! Shared fixtures for orchestrator behaviour tests.

use std::fs::{create_dir_all, read_to_string, write};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use rstest::fixture;
use rtox::repo::RemoteWorkdir;
use rtox::sync::DEFAULT_REMOTE_ROOT;
use rtox::test_support::ScriptedShell;
use rtox::{RunOrchestrator, RunPlan, SyncConfig, SyncDestination, Syncer, ToxConfig};
use tempfile::TempDir;

use super::test_doubles::LocalCopyRunner;

pub const WORKDIR: &str = ".rtox/feedface";

/// A local project, a local "remote" directory, and the doubles wired to
/// them.
#[derive(Clone, Debug)]
pub struct RunContext {
    pub project: Utf8PathBuf,
    pub remote: Utf8PathBuf,
    pub runner: LocalCopyRunner,
    pub shell: ScriptedShell,
    _project_tmp: Arc<TempDir>,
    _remote_tmp: Arc<TempDir>,
}

impl RunContext {
    pub fn write_project_file(&self, relative: &str, contents: &str) {
        write_file(&self.project, relative, contents);
    }

    pub fn write_remote_file(&self, relative: &str, contents: &str) {
        write_file(&self.remote, relative, contents);
    }

    pub fn remote_file(&self, relative: &str) -> Option<String> {
        read_to_string(self.remote.join(relative)).ok()
    }

    pub fn plan(&self, tox_args: &[&str], untox: bool, excludes: &[&str]) -> RunPlan {
        RunPlan {
            source: self.project.clone(),
            workdir: RemoteWorkdir::at(WORKDIR),
            destination: SyncDestination::Local {
                path: self.remote.clone(),
            },
            tox_args: tox_args.iter().map(|arg| (*arg).to_owned()).collect(),
            untox,
            excludes: excludes.iter().map(|pattern| (*pattern).to_owned()).collect(),
        }
    }

    pub fn orchestrator(&self) -> RunOrchestrator<LocalCopyRunner> {
        let sync_config = SyncConfig {
            rsync_bin: String::from("rsync"),
            ssh_bin: String::from("ssh"),
            git_bin: String::from("git"),
            remote_root: String::from(DEFAULT_REMOTE_ROOT),
        };
        let syncer = Syncer::new(sync_config, self.runner.clone())
            .unwrap_or_else(|err| panic!("sync config should validate: {err}"));
        RunOrchestrator::new(
            syncer,
            ToxConfig {
                python_bin: String::from("python3"),
            },
        )
    }
}

fn write_file(root: &Utf8Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        create_dir_all(parent).unwrap_or_else(|err| panic!("create {parent}: {err}"));
    }
    write(&path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
}

fn utf8_tempdir() -> (Arc<TempDir>, Utf8PathBuf) {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("non-utf8 tempdir path: {}", path.display()));
    (Arc::new(tmp), path)
}

#[fixture]
pub fn run_context() -> RunContext {
    let (project_tmp, project) = utf8_tempdir();
    let (remote_tmp, remote) = utf8_tempdir();
    RunContext {
        project,
        remote,
        runner: LocalCopyRunner::default(),
        shell: ScriptedShell::new(),
        _project_tmp: project_tmp,
        _remote_tmp: remote_tmp,
    }
}
