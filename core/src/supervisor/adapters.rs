//! Process adapters for abstracting the OS primitives
//!
//! This module provides the [`ProcessOps`] trait the supervisor drives, the
//! real Unix implementation, and a scripted mock that lets tests exercise
//! the wait protocol (interruptions, missing children, foreign pids) without
//! creating processes.

use crate::error::SpawnError;
use crate::process::unix::{self, Launched, WaitTarget};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use schema::{ChildId, SpawnRequest};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// OS operations needed by the supervisor
pub trait ProcessOps {
    /// Create one child process for `request`
    fn spawn(&self, request: &SpawnRequest) -> Result<Launched, SpawnError>;

    /// One wait call; see [`unix::wait_raw`]
    fn wait(&self, target: WaitTarget, nohang: bool) -> Result<Option<(ChildId, i32)>, Errno>;

    /// Deliver a signal to a child
    fn signal(&self, id: ChildId, signal: Signal) -> Result<(), Errno>;
}

/// Process operations backed by fork/exec/waitpid/kill
#[derive(Copy, Clone, Debug, Default)]
pub struct UnixProcessOps;

impl UnixProcessOps {
    /// Create a new Unix process adapter
    pub fn new() -> Self {
        Self
    }
}

impl ProcessOps for UnixProcessOps {
    fn spawn(&self, request: &SpawnRequest) -> Result<Launched, SpawnError> {
        unix::spawn(request)
    }

    fn wait(&self, target: WaitTarget, nohang: bool) -> Result<Option<(ChildId, i32)>, Errno> {
        unix::wait_raw(target, nohang)
    }

    fn signal(&self, id: ChildId, signal: Signal) -> Result<(), Errno> {
        unix::send_signal(id, signal)
    }
}

/// Scripted process operations for testing
///
/// Spawned children get sequential pids starting at 1000. Wait calls pop
/// scripted results in order; once the script is exhausted every wait
/// reports `ECHILD`.
#[derive(Debug, Default)]
pub struct MockProcessOps {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    next_pid: i32,
    spawn_failures: VecDeque<SpawnError>,
    waits: VecDeque<Result<Option<(i32, i32)>, Errno>>,
    spawned: Vec<SpawnRequest>,
    wait_calls: Vec<(WaitTarget, bool)>,
    signals: Vec<(ChildId, Signal)>,
}

impl MockProcessOps {
    /// Create a new mock with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next spawn fail with `error`
    pub fn fail_next_spawn(&self, error: SpawnError) {
        self.lock().spawn_failures.push_back(error);
    }

    /// Script a wait result reporting `raw_status` for `pid`
    pub fn push_status(&self, pid: i32, raw_status: i32) {
        self.lock().waits.push_back(Ok(Some((pid, raw_status))));
    }

    /// Script a wait failure
    pub fn push_error(&self, errno: Errno) {
        self.lock().waits.push_back(Err(errno));
    }

    /// Script a non-blocking wait that found no state change
    pub fn push_no_change(&self) {
        self.lock().waits.push_back(Ok(None));
    }

    /// Pid the next successful spawn will receive
    pub fn next_pid(&self) -> i32 {
        1000 + self.lock().next_pid
    }

    /// Requests spawned so far
    pub fn spawned(&self) -> Vec<SpawnRequest> {
        self.lock().spawned.clone()
    }

    /// Wait calls made so far
    pub fn wait_calls(&self) -> Vec<(WaitTarget, bool)> {
        self.lock().wait_calls.clone()
    }

    /// Signals delivered so far
    pub fn signals(&self) -> Vec<(ChildId, Signal)> {
        self.lock().signals.clone()
    }
}

impl ProcessOps for MockProcessOps {
    fn spawn(&self, request: &SpawnRequest) -> Result<Launched, SpawnError> {
        debug!("Spawning mock process for: {} {:?}", request.program, request.args);

        let mut state = self.lock();
        if let Some(error) = state.spawn_failures.pop_front() {
            return Err(error);
        }
        let raw = 1000 + state.next_pid;
        state.next_pid += 1;
        state.spawned.push(request.clone());

        let id = ChildId::new(raw).ok_or(SpawnError::ForkFailed {
            syscall: "fork",
            errno: Errno::EINVAL,
        })?;
        Ok(Launched::new(id, None))
    }

    fn wait(&self, target: WaitTarget, nohang: bool) -> Result<Option<(ChildId, i32)>, Errno> {
        let mut state = self.lock();
        state.wait_calls.push((target, nohang));
        match state.waits.pop_front() {
            Some(Ok(Some((pid, raw)))) => Ok(ChildId::new(pid).map(|id| (id, raw))),
            Some(Ok(None)) => Ok(None),
            Some(Err(errno)) => Err(errno),
            None => Err(Errno::ECHILD),
        }
    }

    fn signal(&self, id: ChildId, signal: Signal) -> Result<(), Errno> {
        debug!("Signalling mock process {} with {}", id, signal.as_str());
        self.lock().signals.push((id, signal));
        Ok(())
    }
}
