//! Lifecycle states of a supervised child process
//!
//! ```text
//! Spawning → Running → Exited | Signaled    (terminal)
//!               ↑  ↓
//!              Stopped                       (non-terminal)
//! ```
//!
//! `Spawning` and `Running` are never produced from a wait status; they only
//! describe what the supervisor knows before the OS reports a state change.

use crate::EXEC_FAILURE_EXIT_CODE;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observed state of a child process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ProcessState {
    /// Creation requested, no identity assigned yet
    Spawning,
    /// Created and not known to have changed state
    Running,
    /// Terminated normally with the given exit code (0..=255)
    Exited {
        /// Low-order status byte passed to `exit`
        code: i32,
    },
    /// Terminated by a signal
    Signaled {
        /// Signal number that terminated the process
        signal: i32,
        /// Whether the kernel produced a core dump
        #[serde(rename = "coreDumped")]
        core_dumped: bool,
    },
    /// Stopped by a signal; may continue later
    Stopped {
        /// Signal number that stopped the process
        signal: i32,
    },
}

impl ProcessState {
    /// Whether no further state change can follow
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Exited { .. } | ProcessState::Signaled { .. })
    }

    /// Whether the process is currently stopped
    pub fn is_stopped(&self) -> bool {
        matches!(self, ProcessState::Stopped { .. })
    }

    /// Exit code for a normal termination
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessState::Exited { code } => Some(*code),
            _ => None,
        }
    }

    /// Signal number for a signaled or stopped process
    pub fn signal(&self) -> Option<i32> {
        match self {
            ProcessState::Signaled { signal, .. } | ProcessState::Stopped { signal } => {
                Some(*signal)
            }
            _ => None,
        }
    }

    /// Whether the process exited with status 0
    pub fn is_success(&self) -> bool {
        self.exit_code() == Some(0)
    }

    /// Whether the status carries the reserved exec-failure exit code.
    ///
    /// A program may legitimately exit with the same code, so this alone
    /// does not prove that the program never ran.
    pub fn has_exec_failure_code(&self) -> bool {
        self.exit_code() == Some(EXEC_FAILURE_EXIT_CODE)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Spawning => write!(f, "spawning"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Exited { code } => write!(f, "exited: $? = {}", code),
            ProcessState::Signaled {
                signal,
                core_dumped: true,
            } => write!(f, "signal {} (core dumped)", signal),
            ProcessState::Signaled { signal, .. } => write!(f, "signal {}", signal),
            ProcessState::Stopped { signal } => write!(f, "stopped by signal {}", signal),
        }
    }
}
