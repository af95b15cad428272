//! A minimal interactive command interpreter.
//!
//! A line is either a single command or a pipeline of commands joined by
//! `|`. Each stage runs in its own forked process; [`exec::Executor`]
//! builds the pipes, wires every child and reaps all of them.

pub mod command;
pub mod config;
pub mod editor;
pub mod error;
pub mod exec;
pub mod history;
pub mod parser;
pub mod pipes;
pub mod prompt;
pub mod report;
pub mod shell;
pub mod spawn;
pub mod trace;

pub use command::{CommandSpec, Pipeline};
pub use error::{ExecError, ParseError};
pub use exec::{ExecState, Executor};
pub use report::{ExitStatus, PipelineReport};
pub use spawn::{ForkExecSpawner, Spawner};
