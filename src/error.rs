use std::fmt::Display;

use colored::Colorize;
use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

/// Failures of the pipeline engine itself.
///
/// A program that cannot be executed is not an `ExecError`: that failure
/// stays inside the child and shows up as its exit status.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("could not create pipe {index}: {source}")]
    Pipe {
        index: usize,
        #[source]
        source: Errno,
    },

    #[error("could not fork stage {stage} ({program}): {source}")]
    Fork {
        stage: usize,
        program: String,
        #[source]
        source: Errno,
    },

    #[error("could not wait for child {pid}: {source}")]
    Wait {
        pid: Pid,
        #[source]
        source: Errno,
    },

    #[error("stage {stage} has an argument containing a NUL byte")]
    InvalidArgument { stage: usize },
}

impl ExecError {
    /// True for pipe and fork failures, the ones caused by OS limits.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, ExecError::Pipe { .. } | ExecError::Fork { .. })
    }
}

/// Input lines that never reach the engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command at position {position} of the pipeline")]
    EmptyCommand { position: usize },

    #[error("command at position {position} contains a NUL byte")]
    NulByte { position: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--max-args must be at least 1")]
    ZeroMaxArgs,
}

/// Print a user-facing diagnostic on stderr.
pub fn print_error(err: &dyn Display) {
    eprintln!("{}: {}", "pipesh".red().bold(), err);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_stage_and_operation() {
        let err = ExecError::Fork {
            stage: 2,
            program: "sort".into(),
            source: Errno::EAGAIN,
        };
        let msg = err.to_string();
        assert!(msg.contains("fork"));
        assert!(msg.contains("stage 2"));
        assert!(msg.contains("sort"));
        assert!(err.is_resource_exhaustion());

        let err = ExecError::Pipe {
            index: 0,
            source: Errno::EMFILE,
        };
        assert!(err.to_string().starts_with("could not create pipe 0"));
        assert!(err.is_resource_exhaustion());

        assert!(!ExecError::InvalidArgument { stage: 1 }.is_resource_exhaustion());
    }
}
