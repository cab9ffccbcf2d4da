//! Core error types and utilities
//!
//! Errors are split by the operation that produces them: [`SpawnError`] for
//! process creation, [`WaitError`] for reaping and [`SignalError`] for
//! explicit signal delivery. [`CoreError`] aggregates them for callers that
//! drive a whole launch-and-reap cycle.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use schema::ChildId;
use thiserror::Error;

/// Failure to create a child process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// A creation-time syscall failed; no child process exists
    #[error("{syscall} failed: {errno}")]
    ForkFailed {
        /// Name of the failing syscall
        syscall: &'static str,
        /// Platform error code
        errno: Errno,
    },

    /// The child could not replace its program image.
    ///
    /// Only the child observes this directly. The parent reconstructs it from
    /// a reap report whose exit code is the reserved exec-failure code.
    #[error("exec failed in child: {errno}")]
    ExecFailed {
        /// errno reported by the child before terminating
        errno: Errno,
    },

    /// The request cannot be turned into an argument vector; nothing was created
    #[error("Invalid spawn request: {0}")]
    InvalidRequest(String),
}

impl SpawnError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            SpawnError::ForkFailed { .. } => "SPAWN001",
            SpawnError::ExecFailed { .. } => "SPAWN002",
            SpawnError::InvalidRequest(_) => "SPAWN003",
        }
    }
}

/// Failure to obtain a child state change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// Reap requested while no child is tracked
    #[error("no tracked children to reap")]
    EmptyTable,

    /// The OS reports no children although some are still tracked
    #[error("waitpid reported no children while {tracked} remain tracked")]
    MissedReap {
        /// Number of entries still in the table
        tracked: usize,
    },

    /// The identity is not (or no longer) tracked by this supervisor
    #[error("child {0} is not tracked by this supervisor")]
    UnknownChild(ChildId),

    /// Interruptions exceeded the configured bound
    #[error("wait interrupted {attempts} times without a state change")]
    Interrupted {
        /// Number of interrupted wait calls
        attempts: u32,
    },

    /// Any other wait failure, reported verbatim
    #[error("{syscall} failed: {errno}")]
    Platform {
        /// Name of the failing syscall
        syscall: &'static str,
        /// Platform error code
        errno: Errno,
    },
}

impl WaitError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            WaitError::EmptyTable => "WAIT001",
            WaitError::MissedReap { .. } => "WAIT002",
            WaitError::UnknownChild(_) => "WAIT003",
            WaitError::Interrupted { .. } => "WAIT004",
            WaitError::Platform { .. } => "WAIT005",
        }
    }

    /// Whether the error indicates broken bookkeeping rather than an OS failure
    pub fn is_logic_error(&self) -> bool {
        matches!(
            self,
            WaitError::EmptyTable | WaitError::MissedReap { .. } | WaitError::UnknownChild(_)
        )
    }
}

/// Failure to deliver a signal to a tracked child
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The identity is not tracked, so it may name an unrelated process
    #[error("refusing to signal untracked child {0}")]
    UnknownChild(ChildId),

    /// kill(2) failed
    #[error("failed to send {} to child {id}: {errno}", .signal.as_str())]
    Failed {
        /// Target child
        id: ChildId,
        /// Signal that was not delivered
        signal: Signal,
        /// Platform error code
        errno: Errno,
    },
}

impl SignalError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            SignalError::UnknownChild(_) => "SIGNAL001",
            SignalError::Failed { .. } => "SIGNAL002",
        }
    }
}

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    #[error("Wait error: {0}")]
    Wait(#[from] WaitError),

    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "CORE001",
            CoreError::ValidationError(_) => "CORE002",
            CoreError::InitializationError(_) => "CORE003",
            CoreError::IoError(_) => "CORE004",
            CoreError::Spawn(e) => e.code(),
            CoreError::Wait(e) => e.code(),
            CoreError::Signal(e) => e.code(),
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CoreError::ConfigurationError("test".to_string()).code(),
            "CORE001"
        );
        assert_eq!(CoreError::ValidationError("test".to_string()).code(), "CORE002");
        assert_eq!(
            CoreError::from(std::io::Error::from(std::io::ErrorKind::NotFound)).code(),
            "CORE004"
        );
        assert_eq!(CoreError::from(WaitError::EmptyTable).code(), "WAIT001");
        assert_eq!(
            CoreError::from(SpawnError::InvalidRequest("x".to_string())).code(),
            "SPAWN003"
        );
    }

    #[test]
    fn test_error_display() {
        let error = SpawnError::ForkFailed {
            syscall: "fork",
            errno: Errno::EAGAIN,
        };
        assert!(error.to_string().starts_with("fork failed: EAGAIN"));
    }
}
