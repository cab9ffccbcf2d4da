//! Wait-status decoding
//!
//! Translates the raw status integer filled in by `waitpid(2)` into a
//! [`ProcessState`]. The platform packs exit, signal and stop information
//! into overlapping bit patterns, so the checks run in a fixed order:
//! normal exit, then termination by signal, then stop.

use schema::ProcessState;

/// Classify a raw wait status.
///
/// Never returns `Spawning` or `Running`. Pure: the same input always yields
/// the same output, and any caller holding a status obtained elsewhere can
/// use it without going through a supervisor.
///
/// ```
/// use forkwatch_core::status::decode;
/// use forkwatch_core::ProcessState;
///
/// assert_eq!(decode(0), ProcessState::Exited { code: 0 });
/// ```
pub fn decode(raw: i32) -> ProcessState {
    if libc::WIFEXITED(raw) {
        ProcessState::Exited {
            code: libc::WEXITSTATUS(raw),
        }
    } else if libc::WIFSIGNALED(raw) {
        ProcessState::Signaled {
            signal: libc::WTERMSIG(raw),
            core_dumped: libc::WCOREDUMP(raw),
        }
    } else {
        ProcessState::Stopped {
            signal: libc::WSTOPSIG(raw),
        }
    }
}

/// Whether the raw status reports a stopped child that was resumed.
///
/// Only produced when waiting with `WCONTINUED`. `decode` does not treat it
/// specially; the supervisor checks it first and moves the child back to
/// `Running`.
pub fn is_continued(raw: i32) -> bool {
    libc::WIFCONTINUED(raw)
}
