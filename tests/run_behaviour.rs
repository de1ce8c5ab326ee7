//! Behavioural tests for the run pipeline against a local rsync stand-in.

mod run;

use rstest::rstest;
use rtox::ExitStatus;
use rtox::untox::UNTOX_FILE_NAME;

use run::{RunContext, run_context};

const TOX_INI: &str = "[tox]\nenvlist = py3\n\n[testenv]\ndeps = pytest\ncommands = pytest\n";

#[rstest]
#[tokio::test]
async fn project_is_mirrored_without_tox_environments(run_context: RunContext) {
    let ctx = run_context;
    ctx.write_project_file("tox.ini", TOX_INI);
    ctx.write_project_file("pkg/module.py", "VALUE = 1\n");
    ctx.write_project_file("pkg/module.pyc", "bytecode");
    ctx.write_project_file(".tox/py3/bin/python", "venv");

    let status = ctx
        .orchestrator()
        .execute(&mut ctx.shell.clone(), &ctx.plan(&["-e", "py3"], false, &["*.pyc"]))
        .await
        .expect("run should succeed");

    assert_eq!(status, ExitStatus::Exited(0));
    assert_eq!(ctx.remote_file("tox.ini").as_deref(), Some(TOX_INI));
    assert_eq!(ctx.remote_file("pkg/module.py").as_deref(), Some("VALUE = 1\n"));
    assert!(ctx.remote_file("pkg/module.pyc").is_none(), "excluded pattern copied");
    assert!(ctx.remote_file(".tox/py3/bin/python").is_none(), ".tox copied");
}

#[rstest]
#[tokio::test]
async fn remote_only_files_survive_a_sync(run_context: RunContext) {
    let ctx = run_context;
    ctx.write_project_file("tox.ini", TOX_INI);
    ctx.write_remote_file(".tox/py3/marker", "cached venv");

    ctx.orchestrator()
        .execute(&mut ctx.shell.clone(), &ctx.plan(&[], false, &[]))
        .await
        .expect("run should succeed");

    assert_eq!(
        ctx.remote_file(".tox/py3/marker").as_deref(),
        Some("cached venv")
    );
    assert_eq!(ctx.runner.calls().len(), 1, "one rsync per run");
}

#[rstest]
#[tokio::test]
async fn tox_failure_status_is_returned(run_context: RunContext) {
    let ctx = run_context;
    ctx.write_project_file("tox.ini", TOX_INI);
    for _ in 0..3 {
        ctx.shell.push_exit(0);
    }
    ctx.shell.push_exit(3);

    let status = ctx
        .orchestrator()
        .execute(&mut ctx.shell.clone(), &ctx.plan(&["-e", "lint"], false, &[]))
        .await
        .expect("tox failure is not a pipeline error");

    assert_eq!(status, ExitStatus::Exited(3));
    assert_eq!(status.code(), 3);
}

#[rstest]
#[tokio::test]
async fn untox_leaves_the_synced_configuration_untouched(run_context: RunContext) {
    let ctx = run_context;
    ctx.write_project_file("tox.ini", TOX_INI);

    ctx.orchestrator()
        .execute(&mut ctx.shell.clone(), &ctx.plan(&[], true, &[]))
        .await
        .expect("run should succeed");

    assert_eq!(ctx.remote_file("tox.ini").as_deref(), Some(TOX_INI));
    let commands = ctx.shell.commands();
    let upload = commands
        .iter()
        .find(|command| command.contains(UNTOX_FILE_NAME) && command.starts_with("printf"))
        .expect("untoxed file should be uploaded");
    assert!(upload.contains("sitepackages = True"), "got {upload}");
    assert!(!upload.contains("deps = pytest"), "got {upload}");
    let tox = commands.last().expect("tox should run");
    assert!(tox.contains(&format!("-c {UNTOX_FILE_NAME}")), "got {tox}");
}

#[rstest]
#[tokio::test]
async fn bindep_runs_only_when_the_project_declares_it(run_context: RunContext) {
    let ctx = run_context;
    ctx.write_project_file("tox.ini", TOX_INI);
    ctx.write_project_file("bindep.txt", "libffi-dev [platform:dpkg]\n");

    ctx.orchestrator()
        .execute(&mut ctx.shell.clone(), &ctx.plan(&[], false, &[]))
        .await
        .expect("run should succeed");

    let commands = ctx.shell.commands();
    assert!(
        commands.iter().any(|command| command == "which bindep"),
        "got {commands:?}"
    );
    assert!(
        commands.iter().any(|command| command.ends_with("bindep test")),
        "got {commands:?}"
    );
    assert_eq!(ctx.remote_file("bindep.txt").as_deref(), Some("libffi-dev [platform:dpkg]\n"));
}
