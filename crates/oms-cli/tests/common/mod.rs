//! Shared E2E test helpers for `oms` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(10);

const OMS_VARS: &[&str] = &[
    "OMS_ENFORCE_ATTRIBUTE_RIGHTS",
    "OMS_LOG_LEVEL",
    "OMS_INIT_CMDLINE",
    "RUST_LOG",
];

/// Build a Command for the `oms` binary isolated in a tempdir.
///
/// `HOME` and the project root both point at the tempdir, so neither the
/// developer's global config nor a stray project config leaks in.
/// Returns (command, _guard); keep the guard alive for the test's duration.
pub fn oms_cmd() -> (assert_cmd::Command, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("oms");
    cmd.timeout(TIMEOUT_BASIC);
    for var in OMS_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", tmp.path());
    cmd.args(["-C", tmp.path().to_str().expect("valid utf8")]);
    (cmd, tmp)
}
