use std::fmt;

use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

/// How a reaped child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal exit with the given code.
    Exited(i32),
    /// Killed by the given signal number.
    Signaled(i32),
    /// Any other wait status, carried raw.
    Other,
}

impl ExitStatus {
    pub fn success(self) -> bool {
        self == ExitStatus::Exited(0)
    }

    pub fn code(self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(code),
            _ => None,
        }
    }
}

impl From<WaitStatus> for ExitStatus {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(_, code) => ExitStatus::Exited(code),
            WaitStatus::Signaled(_, signal, _) => ExitStatus::Signaled(signal as i32),
            _ => ExitStatus::Other,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exited with {code}"),
            ExitStatus::Signaled(signal) => write!(f, "terminated by signal {signal}"),
            ExitStatus::Other => f.write_str("ended abnormally"),
        }
    }
}

/// A spawned and reaped stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRecord {
    pub stage: usize,
    pub pid: Pid,
    pub status: ExitStatus,
}

/// Outcome of one pipeline run, children in spawn order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    children: Vec<ChildRecord>,
}

impl PipelineReport {
    /// `children` must be non-empty.
    pub(crate) fn new(mut children: Vec<ChildRecord>) -> Self {
        debug_assert!(!children.is_empty(), "a report needs at least one child");
        children.sort_by_key(|c| c.stage);
        Self { children }
    }

    pub fn children(&self) -> &[ChildRecord] {
        &self.children
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.children.iter().map(|c| c.pid).collect()
    }

    pub fn statuses(&self) -> Vec<ExitStatus> {
        self.children.iter().map(|c| c.status).collect()
    }

    /// Status of the final stage, which is the status of the pipeline.
    pub fn status(&self) -> ExitStatus {
        self.children[self.children.len() - 1].status
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl fmt::Display for PipelineReport {
    /// `Child <pid>, exited with <n>` for a lone command. For a pipeline one
    /// `Childs <pid>` line per stage, the last one carrying the status.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [only] = self.children.as_slice() {
            return write!(f, "Child {}, {}", only.pid, only.status);
        }
        let last = self.children.len() - 1;
        for (i, child) in self.children.iter().enumerate() {
            write!(f, "Childs {}", child.pid)?;
            if i == last {
                write!(f, ", {}", self.status())?;
            } else {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
