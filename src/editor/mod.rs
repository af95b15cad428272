//! Reading one line of input.

mod line;

use std::io::{self, BufRead, StdinLock, Write};

pub use line::LineEditor;

use crate::history::History;

/// Somewhere input lines come from.
pub trait LineSource {
    /// Show `prompt` and read one line, without its newline. `Ok(None)` at
    /// end of input.
    fn read_line(&mut self, prompt: &str, history: &mut History) -> io::Result<Option<String>>;
}

/// Plain buffered reads, for when stdin is not a terminal.
pub struct StdinLines {
    stdin: StdinLock<'static>,
    buf: Vec<u8>,
}

impl StdinLines {
    pub fn new() -> Self {
        Self {
            stdin: io::stdin().lock(),
            buf: Vec::new(),
        }
    }
}

impl Default for StdinLines {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for StdinLines {
    fn read_line(&mut self, prompt: &str, _history: &mut History) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        // Input need not be UTF-8.
        self.buf.clear();
        if self.stdin.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}
