//! Unix process launcher: fork, exec and reap
//!
//! This module creates child processes with `fork(2)` and replaces their
//! program image with `execv(2)`/`execve(2)`.
//!
//! ## Between fork and exec
//!
//! The parent may be multi-threaded, so the child is only allowed
//! async-signal-safe calls until it execs. Every C string and pointer array
//! is therefore built by [`PreparedExec::new`] before the fork, and the child
//! does nothing but `execv`/`execve`, `write` and `_exit`.
//!
//! ## Exec failures
//!
//! After the fork the child cannot hand a value back to the parent. When exec
//! fails the child:
//!
//! - writes its errno into a close-on-exec pipe whose read end the parent
//!   keeps as an [`ExecReport`]; a successful exec closes the pipe instead
//! - writes a diagnostic line to its stderr with an unbuffered `write(2)`
//! - terminates with `_exit(EXEC_FAILURE_EXIT_CODE)`
//!
//! [`spawn`] returns as soon as the fork succeeded. The report is read once
//! the child has terminated, when reading can no longer block.

// Allow unsafe code for this module since fork/exec/waitpid require libc calls
#![allow(unsafe_code)]

use crate::config::validate_request;
use crate::error::SpawnError;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{fork, pipe2, ForkResult, Pid};
use schema::{ChildId, EnvPolicy, SpawnRequest, EXEC_FAILURE_EXIT_CODE};
use std::collections::BTreeMap;
use std::ffi::{CStr, CString, OsString};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::ptr;
use tracing::{debug, warn};

/// Exec arguments converted to C strings ahead of the fork
#[derive(Debug)]
pub struct PreparedExec {
    path: CString,
    argv: Vec<CString>,
    argv_ptrs: Vec<*const libc::c_char>,
    envp: Option<(Vec<CString>, Vec<*const libc::c_char>)>,
    diagnostic: Vec<u8>,
}

impl PreparedExec {
    /// Build the exec arguments for `request`.
    ///
    /// `argv[0]` is the program as written in the request; the exec path is
    /// the program after optional `PATH` resolution. `None` environment means
    /// the child keeps the inherited `environ`.
    pub fn new(request: &SpawnRequest) -> Result<Self, SpawnError> {
        validate_request(request).map_err(SpawnError::InvalidRequest)?;

        let resolved = resolve_program(request);
        let path = cstring(resolved.as_os_str().as_bytes().to_vec(), "program")?;

        let argv = std::iter::once(request.program.as_str())
            .chain(request.args.iter().map(String::as_str))
            .map(|arg| cstring(arg.as_bytes().to_vec(), "args"))
            .collect::<Result<Vec<_>, _>>()?;
        let argv_ptrs = null_terminated(&argv);

        let envp = match &request.env {
            EnvPolicy::Inherit => None,
            EnvPolicy::Extend(vars) => Some(merge_env(std::env::vars_os(), vars)),
            EnvPolicy::Replace(vars) => Some(merge_env(std::iter::empty(), vars)),
        };
        let envp = envp
            .map(|entries| {
                entries
                    .into_iter()
                    .map(|entry| cstring(entry, "env"))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .map(|env| {
                let ptrs = null_terminated(&env);
                (env, ptrs)
            });

        let mut diagnostic = b"forkwatch: cannot execute '".to_vec();
        diagnostic.extend_from_slice(path.as_bytes());
        diagnostic.extend_from_slice(b"': ");

        Ok(Self {
            path,
            argv,
            argv_ptrs,
            envp,
            diagnostic,
        })
    }

    /// Path handed to exec
    pub fn path(&self) -> &CStr {
        &self.path
    }

    /// Argument vector including argv\[0\]
    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// Explicit environment, or `None` when the environment is inherited
    pub fn envp(&self) -> Option<&[CString]> {
        self.envp.as_ref().map(|(env, _)| env.as_slice())
    }

    /// Replace the current program image. Only returns on failure.
    fn exec(&self) -> Errno {
        // Safety: every pointer references a CString owned by `self`, and both
        // pointer arrays end with a null pointer.
        unsafe {
            match &self.envp {
                Some((_, envp)) => {
                    libc::execve(self.path.as_ptr(), self.argv_ptrs.as_ptr(), envp.as_ptr())
                }
                None => libc::execv(self.path.as_ptr(), self.argv_ptrs.as_ptr()),
            };
        }
        Errno::last()
    }
}

fn cstring(bytes: Vec<u8>, field: &str) -> Result<CString, SpawnError> {
    CString::new(bytes)
        .map_err(|_| SpawnError::InvalidRequest(format!("{}: contains a NUL byte", field)))
}

fn null_terminated(strings: &[CString]) -> Vec<*const libc::c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(ptr::null()))
        .collect()
}

/// Build `KEY=VALUE` entries: inherited variables not overridden, then overrides
pub fn merge_env<I>(inherited: I, overrides: &BTreeMap<String, String>) -> Vec<Vec<u8>>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut entries: Vec<Vec<u8>> = inherited
        .into_iter()
        .filter(|(key, _)| key.to_str().map_or(true, |k| !overrides.contains_key(k)))
        .map(|(key, value)| {
            let mut entry = key.into_vec();
            entry.push(b'=');
            entry.extend_from_slice(value.as_bytes());
            entry
        })
        .collect();
    entries.extend(overrides.iter().map(|(key, value)| {
        let mut entry = key.as_bytes().to_vec();
        entry.push(b'=');
        entry.extend_from_slice(value.as_bytes());
        entry
    }));
    entries
}

/// Resolve the exec path for a request.
///
/// Only bare names (no `/`) with `search_path` set are looked up. The
/// request's own `PATH` takes precedence over the parent's. An unresolved
/// name is returned unchanged so that exec reports the failure in the child.
pub fn resolve_program(request: &SpawnRequest) -> PathBuf {
    let program = Path::new(&request.program);
    if !request.search_path || request.program.contains('/') {
        return program.to_path_buf();
    }

    let search = match request.env.vars().and_then(|vars| vars.get("PATH")) {
        Some(path) => Some(OsString::from(path)),
        None => std::env::var_os("PATH"),
    };
    let Some(search) = search else {
        return program.to_path_buf();
    };

    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
        .unwrap_or_else(|| program.to_path_buf())
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Read end of the exec-report pipe of one child
#[derive(Debug)]
pub struct ExecReport {
    fd: OwnedFd,
}

impl ExecReport {
    /// The errno the child reported when exec failed, or `None` if exec
    /// succeeded.
    ///
    /// Call only once the child has terminated; before that `None` may also
    /// mean the child has not reached exec yet.
    pub fn read(self) -> Option<Errno> {
        let mut file = File::from(self.fd);
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Failed to read exec report: {}", e);
                    break;
                }
            }
        }
        match filled {
            0 => None,
            4 => Some(Errno::from_raw(i32::from_ne_bytes(buf))),
            n => {
                warn!("Truncated exec report ({} of 4 bytes)", n);
                None
            }
        }
    }
}

/// A freshly created child
#[derive(Debug)]
pub struct Launched {
    id: ChildId,
    report: Option<ExecReport>,
}

impl Launched {
    /// Wrap a created child and its optional exec-report channel
    pub fn new(id: ChildId, report: Option<ExecReport>) -> Self {
        Self { id, report }
    }

    /// Identity of the child
    pub fn id(&self) -> ChildId {
        self.id
    }

    /// Split into identity and exec report
    pub fn into_parts(self) -> (ChildId, Option<ExecReport>) {
        (self.id, self.report)
    }
}

/// Create a child process running `request`.
///
/// Returns once the child exists; it does not wait for exec. Exactly one
/// process is created on success and none on error.
///
/// ## Example
///
/// ```rust,no_run
/// use forkwatch_core::process::unix::spawn;
/// use schema::SpawnRequest;
///
/// let launched = spawn(&SpawnRequest::new("/bin/echo").arg("hello"))?;
/// println!("Spawned process with PID: {}", launched.id());
/// # Ok::<(), forkwatch_core::SpawnError>(())
/// ```
pub fn spawn(request: &SpawnRequest) -> Result<Launched, SpawnError> {
    let prepared = PreparedExec::new(request)?;
    debug!("Spawning process: {:?} {:?}", prepared.path(), request.args);

    let (report_rx, report_tx) = pipe2(OFlag::O_CLOEXEC | OFlag::O_NONBLOCK)
        .map_err(|errno| SpawnError::ForkFailed {
            syscall: "pipe2",
            errno,
        })?;

    // Safety: the child branch only performs async-signal-safe calls on data
    // prepared before the fork, and never returns.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            drop(report_tx);
            let id = adopt_child(child)?;
            debug!("Successfully spawned process {}", id);
            Ok(Launched::new(id, Some(ExecReport { fd: report_rx })))
        }
        Ok(ForkResult::Child) => exec_child(&prepared, report_tx.as_raw_fd()),
        Err(errno) => Err(SpawnError::ForkFailed {
            syscall: "fork",
            errno,
        }),
    }
}

/// Identity of the child returned to the parent by `fork`.
///
/// nix maps `-1` to `Err` and `0` to `ForkResult::Child`, so a parent-side
/// pid is positive and a child exists. Should a non-positive value ever
/// arrive, no child process corresponds to it. It is neither signalled
/// (`kill(0)` or `kill(-n)` target process groups) nor waited on.
fn adopt_child(child: Pid) -> Result<ChildId, SpawnError> {
    ChildId::new(child.as_raw()).ok_or_else(|| {
        warn!("fork returned non-positive pid {} to the parent", child);
        SpawnError::ForkFailed {
            syscall: "fork",
            errno: Errno::EINVAL,
        }
    })
}

fn exec_child(prepared: &PreparedExec, report_fd: RawFd) -> ! {
    let errno = prepared.exec();

    write_fd(report_fd, &(errno as i32).to_ne_bytes());
    write_fd(libc::STDERR_FILENO, &prepared.diagnostic);
    write_fd(libc::STDERR_FILENO, errno.desc().as_bytes());
    write_fd(libc::STDERR_FILENO, b"\n");

    // Safety: _exit skips atexit handlers and the parent's buffered stdio
    unsafe { libc::_exit(EXEC_FAILURE_EXIT_CODE) }
}

/// Unbuffered write loop, safe to call between fork and exec
fn write_fd(fd: RawFd, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        // Safety: the pointer and length describe a live byte slice
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        if n > 0 {
            bytes = &bytes[n as usize..];
        } else if n < 0 && Errno::last() == Errno::EINTR {
            continue;
        } else {
            return;
        }
    }
}

/// Which children a wait call may report on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    /// Any child of the calling process
    Any,
    /// One specific child
    Child(ChildId),
}

/// Call `waitpid(2)` once, reporting stops and continues as well as exits.
///
/// Returns the reporting child with its raw status, or `None` when `nohang`
/// is set and no child has changed state. Errors are returned unchanged,
/// including `EINTR`.
pub fn wait_raw(target: WaitTarget, nohang: bool) -> Result<Option<(ChildId, i32)>, Errno> {
    let pid = match target {
        WaitTarget::Any => -1,
        WaitTarget::Child(id) => id.as_raw(),
    };
    let mut options = libc::WUNTRACED | libc::WCONTINUED;
    if nohang {
        options |= libc::WNOHANG;
    }

    let mut status: libc::c_int = 0;
    // Safety: `status` is a valid out-pointer for the duration of the call
    let ret = unsafe { libc::waitpid(pid, &mut status, options) };
    match Errno::result(ret)? {
        0 => Ok(None),
        pid => Ok(ChildId::new(pid).map(|id| (id, status))),
    }
}

/// Deliver `signal` to a child
pub fn send_signal(id: ChildId, signal: Signal) -> Result<(), Errno> {
    debug!("Sending {} to process {}", signal.as_str(), id);
    kill(Pid::from_raw(id.as_raw()), signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cstrs: &[CString]) -> Vec<String> {
        cstrs
            .iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_prepare_builds_argv_with_program_first() {
        let req = SpawnRequest::new("/bin/ps").arg("a");
        let prepared = PreparedExec::new(&req).expect("prepare");
        assert_eq!(prepared.path().to_bytes(), b"/bin/ps");
        assert_eq!(strings(prepared.argv()), vec!["/bin/ps", "a"]);
        assert!(prepared.envp().is_none());
        assert_eq!(prepared.argv_ptrs.len(), 3);
        assert!(prepared.argv_ptrs[2].is_null());
    }

    #[test]
    fn test_prepare_replace_env_is_exact() {
        let req = SpawnRequest::new("/usr/bin/env")
            .env_policy(EnvPolicy::clear())
            .env("LANG", "C");
        let prepared = PreparedExec::new(&req).expect("prepare");
        assert_eq!(strings(prepared.envp().expect("explicit env")), vec!["LANG=C"]);
        let (_, ptrs) = prepared.envp.as_ref().expect("explicit env");
        assert!(ptrs.last().expect("terminator").is_null());
    }

    #[test]
    fn test_prepare_rejects_nul_bytes() {
        let req = SpawnRequest::new("/bin/echo").arg("a\0b");
        match PreparedExec::new(&req) {
            Err(SpawnError::InvalidRequest(msg)) => assert!(msg.contains("args[0]")),
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_adopt_child_accepts_positive_pids_only() {
        assert_eq!(adopt_child(Pid::from_raw(4242)).map(|id| id.as_raw()), Ok(4242));
        for raw in [0, -1, -4242] {
            assert_eq!(
                adopt_child(Pid::from_raw(raw)),
                Err(SpawnError::ForkFailed {
                    syscall: "fork",
                    errno: Errno::EINVAL
                })
            );
        }
    }

    #[test]
    fn test_merge_env_overrides_inherited() {
        let inherited = vec![
            (OsString::from("HOME"), OsString::from("/root")),
            (OsString::from("LANG"), OsString::from("en_US.UTF-8")),
        ];
        let overrides = BTreeMap::from([("LANG".to_string(), "C".to_string())]);
        let merged: Vec<String> = merge_env(inherited, &overrides)
            .into_iter()
            .map(|e| String::from_utf8(e).expect("utf8"))
            .collect();
        assert_eq!(merged, vec!["HOME=/root", "LANG=C"]);
    }

    #[test]
    fn test_resolve_program_leaves_paths_alone() {
        let req = SpawnRequest::new("./run.sh").search_path(true);
        assert_eq!(resolve_program(&req), PathBuf::from("./run.sh"));

        let req = SpawnRequest::new("sh");
        assert_eq!(resolve_program(&req), PathBuf::from("sh"));
    }

    #[test]
    fn test_resolve_program_uses_request_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = dir.path().join("tool");
        std::fs::write(&tool, "#!/bin/sh\nexit 0\n").expect("write tool");
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let req = SpawnRequest::new("tool")
            .search_path(true)
            .env("PATH", dir.path().to_string_lossy());
        assert_eq!(resolve_program(&req), tool);
    }

    #[test]
    fn test_resolve_program_skips_non_executable() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("data"), "not a program").expect("write");

        let req = SpawnRequest::new("data")
            .search_path(true)
            .env("PATH", dir.path().to_string_lossy());
        assert_eq!(resolve_program(&req), PathBuf::from("data"));
    }
}
