//! Test utilities for CLI crate integration tests.
#![allow(missing_docs)]
#![allow(dead_code)]

use std::process::{Command, Output};

/// Run the built `forkwatch` binary with `args`.
///
/// # Panics
///
/// Panics if the binary cannot be started.
pub fn forkwatch(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_forkwatch"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run forkwatch")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
