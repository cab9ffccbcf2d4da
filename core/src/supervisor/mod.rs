//! Child-process supervisor
//!
//! This module launches children, tracks them in a [`SupervisorTable`] and
//! reaps their termination status.
//!
//! ## Protocol
//!
//! ```text
//! spawn ──► table[id] = Running ──► waitpid ──► decode ──► terminal? ──► remove, report
//!                                     ▲   │                   │
//!                                     └───┘ EINTR             └─ Stopped: keep, report
//! ```
//!
//! - Interrupted waits are retried; see [`InterruptRetry`].
//! - A continued child goes back to `Running` and waiting goes on.
//! - A status for a child this supervisor did not create is logged and
//!   skipped.
//!
//! ## Concurrency
//!
//! All operations take `&mut self`; the table has no other writer. Driving
//! one supervisor from several threads at once is not supported, and a
//! process should run at most one supervisor that calls [`Supervisor::reap_any`]
//! because it waits on every child of the process.

use crate::config::SupervisorConfig;
use crate::error::{SignalError, SpawnError, WaitError};
use crate::process::unix::{ExecReport, WaitTarget};
use crate::status;
use crate::Result;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use schema::{ChildId, ProcessState, SpawnRequest};
use tracing::{debug, error, info, warn};

pub mod adapters;
pub mod table;
pub mod wait_policy;

pub use adapters::*;
pub use table::*;
pub use wait_policy::*;

/// A state change reported for one child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaped {
    /// The child that changed state
    pub id: ChildId,
    /// Its new state; terminal unless `Stopped`
    pub state: ProcessState,
    /// errno reported by the child when exec failed
    pub exec_error: Option<Errno>,
}

impl Reaped {
    /// Whether the child never ran the requested program
    pub fn exec_failed(&self) -> bool {
        self.exec_error.is_some()
    }

    /// The exec failure as a spawn error, if the program never ran
    pub fn exec_failure(&self) -> Option<SpawnError> {
        self.exec_error.map(|errno| SpawnError::ExecFailed { errno })
    }
}

/// Launches children and reaps their status
#[derive(Debug)]
pub struct Supervisor<P: ProcessOps = UnixProcessOps> {
    ops: P,
    config: SupervisorConfig,
    table: SupervisorTable,
}

impl Supervisor<UnixProcessOps> {
    /// Supervisor backed by the real OS primitives
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_ops(UnixProcessOps::new(), config)
    }
}

impl Default for Supervisor<UnixProcessOps> {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl<P: ProcessOps> Supervisor<P> {
    /// Supervisor backed by custom process operations
    pub fn with_ops(ops: P, config: SupervisorConfig) -> Self {
        Self {
            ops,
            config,
            table: SupervisorTable::new(),
        }
    }

    /// The process operations in use
    pub fn ops(&self) -> &P {
        &self.ops
    }

    /// The configuration in use
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Create a child and start tracking it as `Running`.
    ///
    /// Nothing is tracked when creation fails.
    pub fn spawn(&mut self, request: &SpawnRequest) -> std::result::Result<ChildId, SpawnError> {
        let launched = self.ops.spawn(request).map_err(|e| {
            error!("Failed to spawn '{}': {}", request.program, e);
            e
        })?;
        let (id, report) = launched.into_parts();

        if let Some(stale) = self.table.insert(id, request.program.clone(), report) {
            // Unreachable while the invariant holds: a tracked pid is unreaped
            error!(
                "Process {} was still tracked (program '{}', state {}) when it was spawned again",
                id, stale.program, stale.state
            );
        }
        info!("Started child PID {} ('{}')", id, request.program);
        Ok(id)
    }

    /// Launch one child and block until it terminates or stops
    pub fn launch_and_await(&mut self, request: &SpawnRequest) -> Result<Reaped> {
        let id = self.spawn(request)?;
        Ok(self.wait_for(id)?)
    }

    /// Block until a tracked child terminates or stops.
    ///
    /// Use this to keep waiting after a `Stopped` report.
    pub fn wait_for(&mut self, id: ChildId) -> std::result::Result<Reaped, WaitError> {
        if !self.table.contains(id) {
            return Err(WaitError::UnknownChild(id));
        }
        self.wait_blocking(WaitTarget::Child(id))
    }

    /// Report a pending state change of one tracked child without blocking.
    ///
    /// `Ok(None)` while the child is running. The entry stays tracked until a
    /// terminal report is returned, so the id remains safe to signal.
    pub fn try_wait_for(&mut self, id: ChildId) -> std::result::Result<Option<Reaped>, WaitError> {
        if !self.table.contains(id) {
            return Err(WaitError::UnknownChild(id));
        }
        self.wait_until_report(WaitTarget::Child(id), true)
    }

    /// Block until any tracked child terminates or stops.
    ///
    /// Children are reported in whatever order the OS delivers them. An empty
    /// table is a caller error and returns immediately.
    pub fn reap_any(&mut self) -> std::result::Result<Reaped, WaitError> {
        if self.table.is_empty() {
            return Err(WaitError::EmptyTable);
        }
        self.wait_blocking(WaitTarget::Any)
    }

    /// Report a pending state change without blocking.
    ///
    /// `Ok(None)` when nothing changed or nothing is tracked.
    pub fn try_reap_any(&mut self) -> std::result::Result<Option<Reaped>, WaitError> {
        if self.table.is_empty() {
            return Ok(None);
        }
        self.wait_until_report(WaitTarget::Any, true)
    }

    /// Reap until nothing is tracked, returning terminal reports only.
    ///
    /// Blocks for as long as any tracked child stays stopped.
    pub fn reap_all(&mut self) -> std::result::Result<Vec<Reaped>, WaitError> {
        let mut reaped = Vec::with_capacity(self.table.len());
        while !self.table.is_empty() {
            let report = self.reap_any()?;
            if report.state.is_terminal() {
                reaped.push(report);
            }
        }
        Ok(reaped)
    }

    /// Deliver `signal` to a tracked child
    pub fn signal(&self, id: ChildId, signal: Signal) -> std::result::Result<(), SignalError> {
        if !self.table.contains(id) {
            return Err(SignalError::UnknownChild(id));
        }
        self.ops
            .signal(id, signal)
            .map_err(|errno| SignalError::Failed { id, signal, errno })
    }

    /// Last observed state of a tracked child
    pub fn state(&self, id: ChildId) -> Option<ProcessState> {
        self.table.state(id)
    }

    /// Tracked children with their states, in no particular order
    pub fn tracked(&self) -> Vec<(ChildId, ProcessState)> {
        self.table.iter().collect()
    }

    /// Number of tracked children
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no child is tracked
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn wait_blocking(&mut self, target: WaitTarget) -> std::result::Result<Reaped, WaitError> {
        // A blocking waitpid(2) only returns 0 under WNOHANG
        self.wait_until_report(target, false)?
            .ok_or(WaitError::Platform {
                syscall: "waitpid",
                errno: Errno::EAGAIN,
            })
    }

    fn wait_until_report(
        &mut self,
        target: WaitTarget,
        nohang: bool,
    ) -> std::result::Result<Option<Reaped>, WaitError> {
        let mut retry = InterruptRetry::new(self.config.max_interrupted_waits);
        loop {
            match self.ops.wait(target, nohang) {
                Ok(Some((id, raw))) => {
                    if let Some(report) = self.record(id, raw) {
                        return Ok(Some(report));
                    }
                    retry = InterruptRetry::new(self.config.max_interrupted_waits);
                }
                Ok(None) => return Ok(None),
                Err(Errno::EINTR) => retry.record()?,
                Err(Errno::ECHILD) => {
                    let tracked = self.table.len();
                    error!(
                        "waitpid reported no children while {} remain tracked",
                        tracked
                    );
                    return Err(WaitError::MissedReap { tracked });
                }
                Err(errno) => {
                    error!("waitpid failed: {}", errno);
                    return Err(WaitError::Platform {
                        syscall: "waitpid",
                        errno,
                    });
                }
            }
        }
    }

    /// Apply one raw status; `None` means keep waiting
    fn record(&mut self, id: ChildId, raw: i32) -> Option<Reaped> {
        if !self.table.contains(id) {
            warn!(
                "Ignoring status {:#x} of PID {}, which this supervisor did not spawn",
                raw, id
            );
            return None;
        }

        if status::is_continued(raw) {
            debug!("Process {} continued", id);
            self.table.set_state(id, ProcessState::Running);
            return None;
        }

        let state = status::decode(raw);
        if !state.is_terminal() {
            debug!("Process {} {}", id, state);
            self.table.set_state(id, state);
            return Some(Reaped {
                id,
                state,
                exec_error: None,
            });
        }

        let entry = self.table.remove(id)?;
        let exec_error = entry.report.and_then(ExecReport::read);
        match exec_error {
            Some(errno) => warn!(
                "Process {} could not execute '{}': {}",
                id, entry.program, errno
            ),
            None => info!("Process {} ('{}') {}", id, entry.program, state),
        }
        Some(Reaped {
            id,
            state,
            exec_error,
        })
    }
}

impl<P: ProcessOps> Drop for Supervisor<P> {
    fn drop(&mut self) {
        if !self.table.is_empty() {
            warn!(
                "Supervisor dropped with {} unreaped children",
                self.table.len()
            );
        }
    }
}
