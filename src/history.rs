/// Lines entered this session, browsed with the arrow keys.
pub struct History {
    lines: Vec<String>,
    position: usize,
}

impl History {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            position: 0,
        }
    }

    pub fn add(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        // Don't add duplicate of last line
        if self.lines.last().map(String::as_str) != Some(line) {
            self.lines.push(line.to_string());
        }

        self.position = self.lines.len();
    }

    pub fn previous(&mut self) -> Option<&str> {
        if self.position > 0 {
            self.position -= 1;
            self.lines.get(self.position).map(String::as_str)
        } else {
            None
        }
    }

    /// `None` once past the newest entry, meaning "back to an empty line".
    pub fn next(&mut self) -> Option<&str> {
        if self.position + 1 < self.lines.len() {
            self.position += 1;
            Some(&self.lines[self.position])
        } else {
            self.position = self.lines.len();
            None
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
