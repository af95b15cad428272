use std::io::{self, IsTerminal};

use crate::config::Config;
use crate::editor::{LineEditor, LineSource, StdinLines};
use crate::error::print_error;
use crate::exec::Executor;
use crate::history::History;
use crate::parser::{parse_line, ParsedLine};
use crate::prompt::Prompt;
use crate::spawn::{ForkExecSpawner, Spawner};

/// The read-parse-run loop.
pub struct Shell<S = ForkExecSpawner> {
    prompt: Prompt,
    history: History,
    input: Box<dyn LineSource>,
    executor: Executor<S>,
    max_args: usize,
}

impl Shell<ForkExecSpawner> {
    /// A shell on the process's own stdin, with line editing when that is a
    /// terminal.
    pub fn new(config: &Config) -> Self {
        let input: Box<dyn LineSource> = if io::stdin().is_terminal() {
            Box::new(LineEditor::new())
        } else {
            Box::new(StdinLines::new())
        };
        Self::with_parts(config, input, Executor::new())
    }
}

impl<S: Spawner> Shell<S> {
    pub fn with_parts(config: &Config, input: Box<dyn LineSource>, executor: Executor<S>) -> Self {
        Self {
            prompt: Prompt::new(config.prompt.clone()),
            history: History::new(),
            input,
            executor,
            max_args: config.max_args,
        }
    }

    /// Loop until `exit` or end of input. Only a failure to read input ends
    /// the loop early; everything else is reported and the prompt returns.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            let prompt = self.prompt.get_string();
            let Some(line) = self.input.read_line(&prompt, &mut self.history)? else {
                println!();
                return Ok(());
            };
            if !self.handle_line(&line) {
                return Ok(());
            }
        }
    }

    /// Returns false when the session should end.
    pub fn handle_line(&mut self, line: &str) -> bool {
        self.history.add(line);

        match parse_line(line, self.max_args) {
            Ok(ParsedLine::Empty) => eprintln!("Enter something please"),
            Ok(ParsedLine::Exit) => return false,
            Ok(ParsedLine::Pipeline(pipeline)) => match self.executor.run(&pipeline) {
                Ok(report) => println!("{report}"),
                Err(err) => print_error(&err),
            },
            Err(err) => print_error(&err),
        }
        true
    }

    pub fn executor(&self) -> &Executor<S> {
        &self.executor
    }
}
