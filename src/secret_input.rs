//! Hidden terminal input for secrets.
//!
//! The terminal is put in raw mode while typing, so nothing the user types
//! is echoed.

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

/// What a key press does to the line being typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Insert(char),
    Delete,
    Submit,
    Cancel,
    Ignore,
}

/// State of the line after an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Typing,
    Done,
    Cancelled,
}

fn edit_for(key: KeyEvent) -> Edit {
    if key.kind == KeyEventKind::Release {
        return Edit::Ignore;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('c' | 'd'), m) if m.contains(KeyModifiers::CONTROL) => Edit::Cancel,
        (KeyCode::Esc, _) => Edit::Cancel,
        (KeyCode::Enter, _) => Edit::Submit,
        (KeyCode::Backspace, _) => Edit::Delete,
        (KeyCode::Char(c), m) if !m.contains(KeyModifiers::CONTROL) => Edit::Insert(c),
        _ => Edit::Ignore,
    }
}

fn apply(buffer: &mut String, edit: Edit) -> Step {
    match edit {
        Edit::Insert(c) => {
            buffer.push(c);
            Step::Typing
        }
        Edit::Delete => {
            buffer.pop();
            Step::Typing
        }
        Edit::Submit => Step::Done,
        Edit::Cancel => Step::Cancelled,
        Edit::Ignore => Step::Typing,
    }
}

/// Read one line from the terminal without echoing it.
///
/// Returns `None` when the user cancels with Esc, Ctrl-C or Ctrl-D.
/// Blocks, so call it from `spawn_blocking` inside the runtime.
pub fn read_hidden_line() -> Result<Option<String>> {
    terminal::enable_raw_mode().context("Failed to switch terminal to raw mode")?;
    let line = read_keys();
    let restored = terminal::disable_raw_mode();
    println!();
    restored.context("Failed to restore terminal mode")?;
    line
}

fn read_keys() -> Result<Option<String>> {
    let mut buffer = String::new();
    loop {
        if let Event::Key(key) = event::read().context("Failed to read key press")? {
            match apply(&mut buffer, edit_for(key)) {
                Step::Typing => {}
                Step::Done => return Ok(Some(buffer)),
                Step::Cancelled => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_keys(keys: &[KeyEvent]) -> (String, Step) {
        let mut buffer = String::new();
        let mut step = Step::Typing;
        for key in keys {
            step = apply(&mut buffer, edit_for(*key));
            if step != Step::Typing {
                break;
            }
        }
        (buffer, step)
    }

    #[test]
    fn test_typed_key_is_collected() {
        let (line, step) = type_keys(&[
            press(KeyCode::Char('s')),
            press(KeyCode::Char('k')),
            press(KeyCode::Char('x')),
            press(KeyCode::Backspace),
            press(KeyCode::Char('-')),
            press(KeyCode::Char('1')),
            press(KeyCode::Enter),
        ]);
        assert_eq!(step, Step::Done);
        assert_eq!(line, "sk-1");
    }

    #[test]
    fn test_ctrl_c_cancels() {
        let (_, step) = type_keys(&[
            press(KeyCode::Char('a')),
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            press(KeyCode::Enter),
        ]);
        assert_eq!(step, Step::Cancelled);
        assert_eq!(edit_for(press(KeyCode::Esc)), Edit::Cancel);
    }

    #[test]
    fn test_backspace_on_empty_line() {
        let (line, step) = type_keys(&[press(KeyCode::Backspace), press(KeyCode::Enter)]);
        assert_eq!(step, Step::Done);
        assert!(line.is_empty());
    }

    #[test]
    fn test_other_keys_are_ignored() {
        assert_eq!(edit_for(press(KeyCode::Left)), Edit::Ignore);
        assert_eq!(
            edit_for(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL)),
            Edit::Ignore
        );
        assert_eq!(
            edit_for(KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Edit::Insert('A')
        );
    }
}
