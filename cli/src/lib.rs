//! Helpers behind the `forkwatch` binary
//!
//! Argument parsing, request construction and outcome formatting live here
//! so they can be tested without spawning the binary.

pub mod error;

pub use error::{CliError, Result};

use forkwatch_core::status;
use forkwatch_core::{EnvPolicy, ProcessState, Reaped, SpawnRequest, EXEC_FAILURE_EXIT_CODE};
use serde::Serialize;
use std::collections::BTreeMap;

/// Parse a `KEY=VALUE` environment assignment
pub fn parse_env_assignment(input: &str) -> Result<(String, String)> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::InvalidArgument(format!(
            "expected KEY=VALUE, got '{input}'"
        ))),
    }
}

/// Parse a raw wait status written in decimal or `0x` hexadecimal
pub fn parse_raw_status(input: &str) -> Result<i32> {
    let trimmed = input.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).map(|bits| bits as i32),
        None => trimmed.parse::<i32>(),
    };
    parsed.map_err(|e| CliError::InvalidArgument(format!("invalid raw status '{input}': {e}")))
}

/// Build the request for `forkwatch run`
pub fn build_request(
    program: &str,
    args: &[String],
    env: Vec<(String, String)>,
    clear_env: bool,
    search_path: bool,
) -> SpawnRequest {
    let vars: BTreeMap<String, String> = env.into_iter().collect();
    let policy = if clear_env {
        EnvPolicy::Replace(vars)
    } else if vars.is_empty() {
        EnvPolicy::Inherit
    } else {
        EnvPolicy::Extend(vars)
    };
    SpawnRequest::new(program)
        .args(args.iter().cloned())
        .env_policy(policy)
        .search_path(search_path)
}

/// Shell-style exit code mirroring a child's outcome
pub fn exit_code_for(reaped: &Reaped) -> i32 {
    if reaped.exec_failed() {
        return EXEC_FAILURE_EXIT_CODE;
    }
    match reaped.state {
        ProcessState::Exited { code } => code,
        ProcessState::Signaled { signal, .. } => 128 + signal,
        _ => 1,
    }
}

/// One line of human-readable output for a reaped child
pub fn describe(reaped: &Reaped) -> String {
    match reaped.exec_error {
        Some(errno) => format!(
            "Child PID {} could not be executed: {}",
            reaped.id,
            errno.desc()
        ),
        None => format!("Child PID {} {}", reaped.id, reaped.state),
    }
}

/// Classification of a raw status for `forkwatch decode`
pub fn describe_raw_status(raw: i32) -> String {
    if status::is_continued(raw) {
        "continued".to_string()
    } else {
        status::decode(raw).to_string()
    }
}

/// Machine-readable outcome of one child
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Job name, for batch runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Child process id
    pub pid: i32,
    /// Program as requested
    pub program: String,
    /// Final state
    pub outcome: ProcessState,
    /// Description of the exec failure, if the program never ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_error: Option<String>,
    /// Shell-style exit code
    pub exit_code: i32,
}

impl Report {
    /// Build a report for `reaped`
    pub fn new(reaped: &Reaped, program: &str, name: Option<String>) -> Self {
        Self {
            name,
            pid: reaped.id.as_raw(),
            program: program.to_string(),
            outcome: reaped.state,
            exec_error: reaped.exec_error.map(|errno| errno.desc().to_string()),
            exit_code: exit_code_for(reaped),
        }
    }
}
