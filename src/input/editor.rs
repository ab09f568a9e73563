//! Modal line editor for the command input.
//!
//! A single-line editor with Normal/Insert/Visual modes and the usual
//! word motions. Up/Down recall history filtered by the current value;
//! edits made in insert mode keep the history filter in sync.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::style::Style;
use ratatui::text::{Line, Span};

use crate::config::Palette;
use crate::input::tokenizer::{find_token_at_position, tokenize, TokenType};
use crate::services::clipboard::Clipboard;
use crate::services::history::History;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Insert,
    Visual,
}

/// How long a pending operator (`d`, `c`) stays armed.
const PENDING_TIMEOUT: Duration = Duration::from_secs(2);

pub struct VimInput {
    value: Vec<char>,
    cursor: usize,
    mode: Mode,
    visual_start: usize,
    pending: Option<char>,
    pending_since: Instant,
}

impl Default for VimInput {
    fn default() -> Self {
        Self::new()
    }
}

impl VimInput {
    pub fn new() -> Self {
        VimInput {
            value: Vec::new(),
            cursor: 0,
            mode: Mode::Insert,
            visual_start: 0,
            pending: None,
            pending_since: Instant::now(),
        }
    }

    pub fn value(&self) -> String {
        self.value.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn reset(&mut self) {
        self.value.clear();
        self.cursor = 0;
        self.mode = Mode::Insert;
        self.visual_start = 0;
        self.pending = None;
    }

    pub fn set_value(&mut self, text: &str) {
        self.value = text.chars().collect();
        self.cursor = self.cursor.min(self.value.len());
    }

    /// Insert text relative to the cursor. Newlines collapse to spaces;
    /// this is a single-line editor.
    ///
    /// The insert is end-biased: with the cursor on or past the last
    /// character the text lands at the absolute end of the line and the
    /// cursor follows it there. Only a cursor strictly inside the line
    /// splices mid-string.
    pub fn insert_text(&mut self, text: &str) {
        let sanitised: Vec<char> = text
            .chars()
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        if self.cursor + 1 >= self.value.len() {
            self.value.extend(sanitised.iter().copied());
            self.cursor = self.value.len();
        } else if self.cursor == 0 {
            self.value.splice(0..0, sanitised.iter().copied());
            self.cursor += sanitised.len();
        } else {
            let at = self.cursor;
            self.value.splice(at..at, sanitised.iter().copied());
            self.cursor = at + sanitised.len();
        }
    }

    /// Handle a key press. Returns true when the key was consumed.
    pub fn handle_key(
        &mut self,
        code: KeyCode,
        modifiers: KeyModifiers,
        history: &mut History,
        clipboard: &mut Clipboard,
    ) -> bool {
        if modifiers.contains(KeyModifiers::CONTROL) {
            return false;
        }

        // History recall works in every mode.
        match code {
            KeyCode::Up => {
                let recalled = history.peek();
                if !recalled.is_empty() {
                    self.value = recalled.chars().collect();
                    self.cursor = self.value.len();
                }
                return true;
            }
            KeyCode::Down => {
                let recalled = history.peek_reverse();
                self.value = recalled.chars().collect();
                self.cursor = self.value.len();
                if self.value.is_empty() {
                    history.set_filter("");
                }
                return true;
            }
            _ => {}
        }

        let pending = self.take_pending();

        match self.mode {
            Mode::Normal => self.handle_normal(code, pending, clipboard),
            Mode::Insert => self.handle_insert(code, history, clipboard),
            Mode::Visual => self.handle_visual(code, clipboard),
        }
    }

    fn take_pending(&mut self) -> Option<char> {
        if self.pending_since.elapsed() > PENDING_TIMEOUT {
            self.pending = None;
        }
        self.pending.take()
    }

    fn arm_pending(&mut self, op: char) {
        self.pending = Some(op);
        self.pending_since = Instant::now();
    }

    fn handle_normal(
        &mut self,
        code: KeyCode,
        pending: Option<char>,
        clipboard: &mut Clipboard,
    ) -> bool {
        match code {
            KeyCode::Char('h') | KeyCode::Left => {
                if pending == Some('d') {
                    self.delete_char_before();
                } else {
                    self.move_left();
                }
            }
            KeyCode::Char('l') | KeyCode::Right => {
                if pending == Some('d') {
                    self.delete_char();
                } else {
                    self.move_right();
                }
            }
            KeyCode::Char('0') | KeyCode::Char('_') | KeyCode::Home => {
                if pending == Some('d') {
                    self.value.drain(..self.cursor.min(self.value.len()));
                }
                self.cursor = 0;
            }
            KeyCode::Char('$') | KeyCode::End => {
                if pending == Some('d') {
                    self.value.truncate(self.cursor);
                }
                self.cursor = self.value.len();
            }
            KeyCode::Char('w') => self.move_word_forward(),
            KeyCode::Char('b') => self.move_word_backward(),
            KeyCode::Char('e') => self.move_word_end(),
            KeyCode::Char('i') => self.mode = Mode::Insert,
            KeyCode::Char('a') => {
                self.mode = Mode::Insert;
                self.move_right();
            }
            KeyCode::Char('I') => {
                self.mode = Mode::Insert;
                self.cursor = 0;
            }
            KeyCode::Char('A') => {
                self.mode = Mode::Insert;
                self.cursor = self.value.len();
            }
            KeyCode::Char('x') => self.delete_char(),
            KeyCode::Char('X') => self.delete_char_before(),
            KeyCode::Char('v') => {
                self.mode = Mode::Visual;
                self.visual_start = self.cursor;
            }
            KeyCode::Char('y') => {
                let _ = clipboard.copy(self.value());
            }
            KeyCode::Char('p') => {
                if let Some(text) = clipboard.paste() {
                    self.insert_text(&text);
                }
            }
            KeyCode::Char('P') => {
                if let Some(text) = clipboard.paste() {
                    self.cursor = self.cursor.saturating_sub(1);
                    self.insert_text(&text);
                }
            }
            KeyCode::Char('D') => {
                self.value.truncate(self.cursor);
                self.cursor = self.value.len();
            }
            KeyCode::Char('d') => {
                if pending == Some('d') {
                    self.value.clear();
                    self.cursor = 0;
                } else {
                    self.arm_pending('d');
                }
            }
            KeyCode::Char('s') => {
                self.delete_char();
                self.mode = Mode::Insert;
            }
            KeyCode::Char('c') => {
                if pending == Some('c') {
                    self.value.truncate(self.cursor);
                    self.cursor = self.value.len();
                    self.mode = Mode::Insert;
                } else {
                    self.arm_pending('c');
                }
            }
            KeyCode::Char('C') => {
                self.value.truncate(self.cursor);
                self.cursor = self.value.len();
                self.mode = Mode::Insert;
            }
            _ => return false,
        }
        true
    }

    fn handle_insert(
        &mut self,
        code: KeyCode,
        history: &mut History,
        _clipboard: &mut Clipboard,
    ) -> bool {
        match code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.move_left();
            }
            KeyCode::Backspace => self.delete_char_before(),
            KeyCode::Delete => self.delete_char(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.len(),
            KeyCode::Char(c) => {
                let mut utf8 = [0u8; 4];
                self.insert_text(c.encode_utf8(&mut utf8));
            }
            _ => return false,
        }
        history.set_filter(&self.value());
        true
    }

    fn handle_visual(&mut self, code: KeyCode, clipboard: &mut Clipboard) -> bool {
        match code {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Char('h') | KeyCode::Left => self.move_left(),
            KeyCode::Char('l') | KeyCode::Right => self.move_right(),
            KeyCode::Char('0') | KeyCode::Home => self.cursor = 0,
            KeyCode::Char('$') | KeyCode::End => self.cursor = self.value.len(),
            KeyCode::Char('w') => self.move_word_forward(),
            KeyCode::Char('b') => self.move_word_backward(),
            KeyCode::Char('e') => self.move_word_end(),
            KeyCode::Char('y') => {
                let (start, end) = self.visual_selection();
                if start != end {
                    let selected: String = self.value[start..end].iter().collect();
                    let _ = clipboard.copy(selected);
                }
                self.mode = Mode::Normal;
            }
            KeyCode::Char('d') | KeyCode::Char('x') => {
                let (start, end) = self.visual_selection();
                if start != end {
                    let selected: String = self.value[start..end].iter().collect();
                    let _ = clipboard.copy(selected);
                    self.value.drain(start..end);
                    self.cursor = start;
                }
                self.mode = Mode::Normal;
            }
            KeyCode::Char('c') | KeyCode::Char('s') => {
                let (start, end) = self.visual_selection();
                self.value.drain(start..end);
                self.cursor = start;
                self.mode = Mode::Insert;
            }
            _ => return false,
        }
        true
    }

    /// Selection as a half-open char range covering the cursor cell.
    pub fn visual_selection(&self) -> (usize, usize) {
        let (mut start, mut end) = (self.visual_start, self.cursor);
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        (start.min(self.value.len()), (end + 1).min(self.value.len()))
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        if self.cursor < self.value.len() {
            self.cursor += 1;
        }
    }

    fn delete_char(&mut self) {
        if self.cursor < self.value.len() {
            self.value.remove(self.cursor);
        }
    }

    fn delete_char_before(&mut self) {
        if self.cursor > 0 {
            self.value.remove(self.cursor - 1);
            self.cursor -= 1;
        }
    }

    /// `w`: beginning of the next word.
    fn move_word_forward(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        let text = self.value();
        let tokens = tokenize(&text);
        if tokens.is_empty() {
            return;
        }

        let mut idx = find_token_at_position(&tokens, self.cursor);
        let current = &tokens[idx];
        if self.cursor >= current.start
            && self.cursor < current.end
            && current.kind != TokenType::Space
        {
            idx += 1;
        }
        while idx < tokens.len() && tokens[idx].kind == TokenType::Space {
            idx += 1;
        }

        self.cursor = match tokens.get(idx) {
            Some(token) => token.start,
            None => self.value.len(),
        };
    }

    /// `b`: beginning of the current or previous word.
    fn move_word_backward(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let text = self.value();
        let tokens = tokenize(&text);
        if tokens.is_empty() {
            return;
        }

        let mut idx = find_token_at_position(&tokens, self.cursor - 1) as isize;
        let current = &tokens[idx as usize];
        if self.cursor == current.start && current.kind != TokenType::Space {
            idx -= 1;
        }
        while idx >= 0 && tokens[idx as usize].kind == TokenType::Space {
            idx -= 1;
        }

        self.cursor = if idx >= 0 {
            tokens[idx as usize].start
        } else {
            0
        };
    }

    /// `e`: end of the current or next word.
    fn move_word_end(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        let text = self.value();
        let tokens = tokenize(&text);
        if tokens.is_empty() {
            return;
        }

        let mut idx = find_token_at_position(&tokens, self.cursor);
        let current = &tokens[idx];
        if self.cursor + 1 == current.end && current.kind != TokenType::Space {
            idx += 1;
        }
        while idx < tokens.len() && tokens[idx].kind == TokenType::Space {
            idx += 1;
        }

        let target = match tokens.get(idx) {
            Some(token) => token.end.saturating_sub(1),
            None => self.value.len().saturating_sub(1),
        };
        self.cursor = target.min(self.value.len().saturating_sub(1));
    }

    /// The mode badge and the value with cursor / selection styling.
    pub fn render(&self, palette: &Palette, focused: bool) -> Line<'static> {
        let mut spans: Vec<Span<'static>> = Vec::new();

        let (badge, bg, fg) = match self.mode {
            Mode::Normal => (" N ", palette.normal_bg, palette.normal_fg),
            Mode::Insert => (" I ", palette.insert_bg, palette.insert_fg),
            Mode::Visual => (" V ", palette.visual_bg, palette.visual_fg),
        };
        spans.push(Span::styled(badge, Style::default().bg(bg).fg(fg)));
        spans.push(Span::raw(" "));

        let text_style = Style::default().fg(palette.text);
        let cursor_style = Style::default().bg(palette.cursor).fg(palette.cursor_text);
        let selection_style = text_style.bg(palette.visual_selection);
        let (sel_start, sel_end) = self.visual_selection();

        if self.value.is_empty() {
            if focused {
                spans.push(Span::styled(" ", cursor_style));
            }
            return Line::from(spans);
        }

        for (i, &c) in self.value.iter().enumerate() {
            let style = if focused && i == self.cursor {
                cursor_style
            } else if focused && self.mode == Mode::Visual && i >= sel_start && i < sel_end {
                selection_style
            } else {
                text_style
            };
            spans.push(Span::styled(c.to_string(), style));
        }

        if focused && self.cursor == self.value.len() {
            spans.push(Span::styled(" ", cursor_style));
        }

        Line::from(spans)
    }
}
