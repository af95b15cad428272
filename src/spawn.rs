//! Starting one pipeline stage as a child process.
//!
//! The child side of `ForkExecSpawner` runs between fork and exec and must
//! stay async-signal-safe: no allocation, no locks, no tracing. Everything it
//! needs (argv, diagnostics) is prepared in the parent before forking.

use std::ffi::{CString, NulError};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::ptr;

use nix::errno::Errno;
use nix::sys::wait::waitpid;
use nix::unistd::{fork, ForkResult, Pid};

use crate::command::CommandSpec;
use crate::error::ExecError;
use crate::report::ExitStatus;
use crate::trace;

/// Exit status of a child whose program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit status of a child whose program was found but could not be run.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;
/// Exit status of a child that could not wire its standard streams.
pub const EXIT_SETUP_FAILED: i32 = 1;

/// Where a stage reads from.
#[derive(Debug, Clone, Copy)]
pub enum StdinSource<'a> {
    Inherit,
    Pipe(BorrowedFd<'a>),
}

/// Where a stage writes to.
#[derive(Debug, Clone, Copy)]
pub enum StdoutSink<'a> {
    Inherit,
    Pipe(BorrowedFd<'a>),
}

/// Stream assignment for one stage, plus every pipe endpoint of the run,
/// which the child closes after duplicating its own.
#[derive(Debug, Clone, Copy)]
pub struct Wiring<'a> {
    pub stage: usize,
    pub stdin: StdinSource<'a>,
    pub stdout: StdoutSink<'a>,
    pub sweep: &'a [RawFd],
}

impl Wiring<'_> {
    /// Wiring of a lone command: inherit everything, close nothing.
    pub fn inherit() -> Wiring<'static> {
        Wiring {
            stage: 0,
            stdin: StdinSource::Inherit,
            stdout: StdoutSink::Inherit,
            sweep: &[],
        }
    }
}

/// A running stage, owned by the coordinator until it is reaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildHandle {
    pub pid: Pid,
    pub stage: usize,
    pub program: String,
}

/// The capability to start a stage and later reap it.
pub trait Spawner {
    /// Start `spec` with the streams given by `wiring`. Returns once the
    /// child exists; does not wait for it.
    fn spawn(&mut self, spec: &CommandSpec, wiring: &Wiring<'_>) -> Result<ChildHandle, ExecError>;

    /// Block until `child` terminates. Called exactly once per handle.
    fn wait(&mut self, child: &ChildHandle) -> Result<ExitStatus, ExecError>;

    /// Open one pipe between neighbouring stages.
    fn make_pipe(&mut self) -> Result<(OwnedFd, OwnedFd), Errno> {
        crate::pipes::make_pipe()
    }
}

/// `fork` + `dup2` + sweep close + `execvp`.
#[derive(Debug, Default)]
pub struct ForkExecSpawner;

impl ForkExecSpawner {
    pub fn new() -> Self {
        ForkExecSpawner
    }
}

impl Spawner for ForkExecSpawner {
    fn spawn(&mut self, spec: &CommandSpec, wiring: &Wiring<'_>) -> Result<ChildHandle, ExecError> {
        let argv = ArgVec::new(spec.args()).map_err(|_| ExecError::InvalidArgument {
            stage: wiring.stage,
        })?;
        let prefix = if wiring.sweep.is_empty() {
            format!("pipesh: {}: ", spec.program())
        } else {
            format!("pipesh: stage {}: {}: ", wiring.stage, spec.program())
        };

        match unsafe { fork() } {
            Ok(ForkResult::Child) => exec_child(&argv, wiring, prefix.as_bytes()),
            Ok(ForkResult::Parent { child }) => {
                trace!(spawn, "stage {} '{}' is pid {}", wiring.stage, spec.display(), child);
                Ok(ChildHandle {
                    pid: child,
                    stage: wiring.stage,
                    program: spec.program().to_owned(),
                })
            }
            Err(source) => Err(ExecError::Fork {
                stage: wiring.stage,
                program: spec.program().to_owned(),
                source,
            }),
        }
    }

    fn wait(&mut self, child: &ChildHandle) -> Result<ExitStatus, ExecError> {
        loop {
            match waitpid(child.pid, None) {
                Ok(status) => {
                    let status = ExitStatus::from(status);
                    trace!(wait, "pid {} ({}) {}", child.pid, child.program, status);
                    return Ok(status);
                }
                Err(Errno::EINTR) => continue,
                Err(source) => {
                    return Err(ExecError::Wait {
                        pid: child.pid,
                        source,
                    })
                }
            }
        }
    }
}

/// Null-terminated argv for `execvp`, built before fork.
struct ArgVec {
    // Pointed to by `ptrs`.
    strings: Vec<CString>,
    ptrs: Vec<*const libc::c_char>,
}

impl ArgVec {
    fn new(args: &[String]) -> Result<Self, NulError> {
        let strings = args
            .iter()
            .map(|a| CString::new(a.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        let ptrs = strings
            .iter()
            .map(|s| s.as_ptr())
            .chain(std::iter::once(ptr::null()))
            .collect();
        Ok(Self { strings, ptrs })
    }

    fn program(&self) -> *const libc::c_char {
        self.strings[0].as_ptr()
    }

    fn as_ptr(&self) -> *const *const libc::c_char {
        self.ptrs.as_ptr()
    }
}

fn write_stderr(parts: &[&[u8]]) {
    for part in parts {
        unsafe {
            libc::write(libc::STDERR_FILENO, part.as_ptr().cast(), part.len());
        }
    }
}

fn child_fail(prefix: &[u8], what: &[u8], code: i32) -> ! {
    write_stderr(&[prefix, what, b"\n"]);
    unsafe { libc::_exit(code) }
}

/// Runs in the forked child. Never returns.
fn exec_child(argv: &ArgVec, wiring: &Wiring<'_>, prefix: &[u8]) -> ! {
    if let StdinSource::Pipe(fd) = wiring.stdin {
        if unsafe { libc::dup2(fd.as_raw_fd(), libc::STDIN_FILENO) } < 0 {
            child_fail(prefix, b"cannot attach stdin to pipe", EXIT_SETUP_FAILED);
        }
    }
    if let StdoutSink::Pipe(fd) = wiring.stdout {
        if unsafe { libc::dup2(fd.as_raw_fd(), libc::STDOUT_FILENO) } < 0 {
            child_fail(prefix, b"cannot attach stdout to pipe", EXIT_SETUP_FAILED);
        }
    }

    // The duplicated slots stay usable without the originals.
    for &fd in wiring.sweep {
        unsafe { libc::close(fd) };
    }

    // Ignored dispositions survive exec, and the Rust runtime ignores SIGPIPE.
    unsafe { libc::signal(libc::SIGPIPE, libc::SIG_DFL) };

    unsafe { libc::execvp(argv.program(), argv.as_ptr()) };

    match Errno::last() {
        Errno::ENOENT | Errno::ENOTDIR => child_fail(prefix, b"command not found", EXIT_NOT_FOUND),
        Errno::EACCES => child_fail(prefix, b"permission denied", EXIT_NOT_EXECUTABLE),
        Errno::ENOEXEC => child_fail(prefix, b"exec format error", EXIT_NOT_EXECUTABLE),
        _ => child_fail(prefix, b"cannot execute", EXIT_NOT_EXECUTABLE),
    }
}
