//! Shared handle on the `rtox` binary built with test backdoors.
//!
//! Integration tests are compiled as separate crates, so each test file that
//! needs the binary includes this module via `#[path]`.

use std::sync::LazyLock;

use escargot::CargoBuild;

#[expect(
    clippy::expect_used,
    reason = "test setup requires panic on build failure"
)]
static RTOX_BIN: LazyLock<escargot::CargoRun> = LazyLock::new(|| {
    CargoBuild::new()
        .bin("rtox")
        .features("test-backdoors")
        .run()
        .expect("failed to build rtox with test-backdoors feature")
});

/// Returns a command for the backdoor-enabled binary with fakes switched on.
pub fn fake_rtox_cmd() -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = RTOX_BIN.command().into();
    cmd.env("RTOX_FAKE_RUN_ENABLE", "1");
    cmd.env_remove("RTOX_FAKE_RUN_MODE");
    cmd.env_remove("RTOX_FAKE_RUN_PREFAIL");
    cmd
}
