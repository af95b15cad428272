use std::io::{self, Stdout, Write};
use std::sync::Once;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::Print,
    terminal::{self, ClearType},
};

use super::LineSource;
use crate::history::History;

static SET_PANIC_HOOK: Once = Once::new();

/// Stdout in raw mode. Cooked mode comes back on drop, and on panic.
struct RawTerminal {
    out: Stdout,
}

impl RawTerminal {
    fn enter() -> io::Result<Self> {
        SET_PANIC_HOOK.call_once(|| {
            let prev = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                let _ = terminal::disable_raw_mode();
                prev(info);
            }));
        });
        terminal::enable_raw_mode()?;
        Ok(Self { out: io::stdout() })
    }

    /// Repaint the whole line and park the cursor at `cursor` chars past
    /// the prompt.
    fn redraw(&mut self, prompt: &str, buffer: &[char], cursor: usize) -> io::Result<()> {
        let text: String = buffer.iter().collect();
        let column = prompt.chars().count() + cursor;
        queue!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print(prompt),
            Print(text),
            cursor::MoveToColumn(u16::try_from(column).unwrap_or(u16::MAX)),
        )?;
        self.out.flush()
    }

    fn newline(&mut self) -> io::Result<()> {
        queue!(self.out, Print("\r\n"))?;
        self.out.flush()
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Interactive line editing for a terminal: cursor keys, home/end,
/// backspace/delete and history browsing.
pub struct LineEditor {
    buffer: Vec<char>,
    cursor: usize,
}

enum Action {
    Continue,
    Submit,
    EndOfInput,
}

impl LineEditor {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
        }
    }

    fn replace(&mut self, text: &str) {
        self.buffer = text.chars().collect();
        self.cursor = self.buffer.len();
    }

    fn handle_key(&mut self, key: KeyEvent, history: &mut History) -> Action {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => return Action::Submit,
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                // Drop the current line and submit nothing.
                self.buffer.clear();
                self.cursor = 0;
                return Action::Submit;
            }
            (KeyCode::Char('d'), KeyModifiers::CONTROL) => {
                if self.buffer.is_empty() {
                    return Action::EndOfInput;
                }
            }
            (KeyCode::Backspace, _) if self.cursor > 0 => {
                self.cursor -= 1;
                self.buffer.remove(self.cursor);
            }
            (KeyCode::Delete, _) if self.cursor < self.buffer.len() => {
                self.buffer.remove(self.cursor);
            }
            (KeyCode::Left, _) => self.cursor = self.cursor.saturating_sub(1),
            (KeyCode::Right, _) => self.cursor = (self.cursor + 1).min(self.buffer.len()),
            (KeyCode::Home, _) => self.cursor = 0,
            (KeyCode::End, _) => self.cursor = self.buffer.len(),
            (KeyCode::Up, _) => {
                if let Some(entry) = history.previous() {
                    let entry = entry.to_owned();
                    self.replace(&entry);
                }
            }
            (KeyCode::Down, _) => match history.next() {
                Some(entry) => {
                    let entry = entry.to_owned();
                    self.replace(&entry);
                }
                None => self.replace(""),
            },
            (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
            }
            _ => {}
        }
        Action::Continue
    }
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for LineEditor {
    fn read_line(&mut self, prompt: &str, history: &mut History) -> io::Result<Option<String>> {
        self.buffer.clear();
        self.cursor = 0;

        let mut term = RawTerminal::enter()?;
        term.redraw(prompt, &self.buffer, self.cursor)?;

        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind == KeyEventKind::Release {
                continue;
            }
            match self.handle_key(key, history) {
                Action::Continue => term.redraw(prompt, &self.buffer, self.cursor)?,
                Action::Submit => {
                    term.newline()?;
                    return Ok(Some(self.buffer.iter().collect()));
                }
                Action::EndOfInput => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(editor: &mut LineEditor, history: &mut History, code: KeyCode) -> bool {
        let key = KeyEvent::new(code, KeyModifiers::NONE);
        matches!(editor.handle_key(key, history), Action::Submit)
    }

    fn typed(editor: &LineEditor) -> String {
        editor.buffer.iter().collect()
    }

    #[test]
    fn edits_in_the_middle() {
        let mut ed = LineEditor::new();
        let mut h = History::new();
        for c in "ls wc".chars() {
            press(&mut ed, &mut h, KeyCode::Char(c));
        }
        for _ in 0..3 {
            press(&mut ed, &mut h, KeyCode::Left);
        }
        for c in "| ".chars() {
            press(&mut ed, &mut h, KeyCode::Char(c));
        }
        assert_eq!(typed(&ed), "ls | wc");

        press(&mut ed, &mut h, KeyCode::Home);
        press(&mut ed, &mut h, KeyCode::Delete);
        press(&mut ed, &mut h, KeyCode::End);
        press(&mut ed, &mut h, KeyCode::Backspace);
        assert_eq!(typed(&ed), "s | w");
        assert!(press(&mut ed, &mut h, KeyCode::Enter));
    }

    #[test]
    fn arrows_walk_history() {
        let mut ed = LineEditor::new();
        let mut h = History::new();
        h.add("first");
        h.add("second");

        press(&mut ed, &mut h, KeyCode::Up);
        assert_eq!(typed(&ed), "second");
        press(&mut ed, &mut h, KeyCode::Up);
        assert_eq!(typed(&ed), "first");
        press(&mut ed, &mut h, KeyCode::Down);
        assert_eq!(typed(&ed), "second");
        press(&mut ed, &mut h, KeyCode::Down);
        assert_eq!(typed(&ed), "");
    }

    #[test]
    fn ctrl_d_ends_input_only_on_empty_line() {
        let mut ed = LineEditor::new();
        let mut h = History::new();
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);

        press(&mut ed, &mut h, KeyCode::Char('x'));
        assert!(matches!(ed.handle_key(ctrl_d, &mut h), Action::Continue));
        press(&mut ed, &mut h, KeyCode::Backspace);
        assert!(matches!(ed.handle_key(ctrl_d, &mut h), Action::EndOfInput));
    }
}
