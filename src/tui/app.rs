//! Application state for the TUI.
//!
//! Key handling is synchronous and side-effect free: it edits local state
//! and returns an [`Action`] for the event loop, which owns the console and
//! performs the corresponding async operation.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use db_lookout::console::Session;

/// Which overlay, if any, is drawn on top of the main layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overlay {
    #[default]
    None,
    Help,
    Reference,
}

/// What the event loop should do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    /// Submit the editor contents.
    Submit(String),
    OpenVisualizer,
    CloseVisualizer,
    Quit,
}

/// Multi-line query editor state.
///
/// The cursor is a character index into `text`.
#[derive(Debug, Default)]
pub struct Editor {
    pub text: String,
    pub cursor: usize,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.text
            .char_indices()
            .nth(cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Inserts a character at the cursor position.
    pub fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.text.insert(at, c);
        self.cursor += 1;
    }

    pub fn newline(&mut self) {
        self.insert('\n');
    }

    /// Deletes the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index(self.cursor);
            self.text.remove(at);
        }
    }

    /// Deletes the character at the cursor.
    pub fn delete(&mut self) {
        if self.cursor < self.char_len() {
            let at = self.byte_index(self.cursor);
            self.text.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.char_len() {
            self.cursor += 1;
        }
    }

    /// Returns the cursor as (line, column), both zero-based.
    pub fn position(&self) -> (usize, usize) {
        let mut line = 0;
        let mut col = 0;
        for c in self.text.chars().take(self.cursor) {
            if c == '\n' {
                line += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    fn line_lengths(&self) -> Vec<usize> {
        self.text.split('\n').map(|l| l.chars().count()).collect()
    }

    fn set_position(&mut self, line: usize, col: usize) {
        let lengths = self.line_lengths();
        let line = line.min(lengths.len().saturating_sub(1));
        let before: usize = lengths.iter().take(line).map(|l| l + 1).sum();
        self.cursor = before + col.min(lengths.get(line).copied().unwrap_or(0));
    }

    pub fn move_up(&mut self) {
        let (line, col) = self.position();
        if line > 0 {
            self.set_position(line - 1, col);
        }
    }

    pub fn move_down(&mut self) {
        let (line, col) = self.position();
        self.set_position(line + 1, col);
    }

    /// Moves to the start of the current line.
    pub fn move_home(&mut self) {
        let (line, _) = self.position();
        self.set_position(line, 0);
    }

    /// Moves to the end of the current line.
    pub fn move_end(&mut self) {
        let (line, _) = self.position();
        self.set_position(line, usize::MAX);
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub editor: Editor,
    pub session: Session,
    pub overlay: Overlay,
    /// First result row shown.
    pub result_scroll: usize,
    /// Shown while a query runs.
    pub busy: bool,
    /// Data profile target, for the header.
    pub target: String,
    /// Statement policy name, for the header.
    pub policy: String,
}

impl App {
    pub fn new(target: impl Into<String>, policy: impl Into<String>) -> Self {
        Self {
            running: true,
            editor: Editor::new(),
            session: Session::new(),
            overlay: Overlay::None,
            result_scroll: 0,
            busy: false,
            target: target.into(),
            policy: policy.into(),
        }
    }

    /// Handles a key press and returns the action for the event loop.
    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => {
                self.running = false;
                return Action::Quit;
            }
            KeyCode::F(1) => {
                self.toggle_overlay(Overlay::Help);
                return Action::None;
            }
            KeyCode::F(2) => {
                self.toggle_overlay(Overlay::Reference);
                return Action::None;
            }
            KeyCode::Esc => {
                if self.overlay != Overlay::None {
                    self.overlay = Overlay::None;
                    return Action::None;
                }
                return if self.session.explorer().is_some() {
                    Action::CloseVisualizer
                } else {
                    Action::None
                };
            }
            _ => {}
        }

        // Overlays swallow everything else
        if self.overlay != Overlay::None {
            return Action::None;
        }

        match key.code {
            KeyCode::F(5) => return self.submit(),
            KeyCode::Char('r') if ctrl => return self.submit(),
            KeyCode::F(6) => return Action::OpenVisualizer,
            KeyCode::Char('v') if ctrl => return Action::OpenVisualizer,
            KeyCode::Char('u') if ctrl => self.editor.clear(),
            KeyCode::PageUp => self.result_scroll = self.result_scroll.saturating_sub(10),
            KeyCode::PageDown => self.result_scroll = self.result_scroll.saturating_add(10),
            KeyCode::Char(c) if !ctrl => self.editor.insert(c),
            KeyCode::Enter => self.editor.newline(),
            KeyCode::Tab => {
                for _ in 0..4 {
                    self.editor.insert(' ');
                }
            }
            KeyCode::Backspace => self.editor.backspace(),
            KeyCode::Delete => self.editor.delete(),
            KeyCode::Left => self.editor.move_left(),
            KeyCode::Right => self.editor.move_right(),
            KeyCode::Up => self.editor.move_up(),
            KeyCode::Down => self.editor.move_down(),
            KeyCode::Home => self.editor.move_home(),
            KeyCode::End => self.editor.move_end(),
            _ => {}
        }
        Action::None
    }

    fn submit(&mut self) -> Action {
        self.result_scroll = 0;
        Action::Submit(self.editor.text.clone())
    }

    fn toggle_overlay(&mut self, overlay: Overlay) {
        self.overlay = if self.overlay == overlay {
            Overlay::None
        } else {
            overlay
        };
    }
}
