//! Centered modal listing tab-completion candidates.

use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::config::Palette;
use crate::services::completion::Completion;

#[derive(Default)]
pub struct CompletionOverlay {
    pub active: bool,
    pub items: Vec<Completion>,
    pub cursor: usize,
    pub error: Option<String>,
}

impl CompletionOverlay {
    pub fn open(&mut self, items: Vec<Completion>, error: Option<String>) {
        self.active = true;
        self.items = items;
        self.cursor = 0;
        self.error = error;
    }

    pub fn close(&mut self) {
        self.active = false;
        self.items.clear();
        self.cursor = 0;
        self.error = None;
    }

    /// Move the highlight backwards, wrapping.
    pub fn cursor_back(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.cursor = match self.cursor {
            0 => self.items.len() - 1,
            n => n - 1,
        };
    }

    /// Move the highlight forwards, wrapping.
    pub fn cursor_forward(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.cursor = (self.cursor + 1) % self.items.len();
    }

    pub fn selected(&self) -> Option<&Completion> {
        self.items.get(self.cursor)
    }
}

const HINT: &str = "(Enter to insert, Tab/↑ back, ↓ forward, Esc to close)";

pub fn render(frame: &mut Frame, area: Rect, overlay: &CompletionOverlay, palette: &Palette) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    lines.push(Line::styled(
        HINT.to_string(),
        Style::default().fg(palette.header),
    ));

    if let Some(error) = &overlay.error {
        lines.push(Line::styled(
            format!("error: {}", error),
            Style::default().fg(palette.failed),
        ));
    }

    for (i, item) in overlay.items.iter().enumerate() {
        if i == overlay.cursor {
            lines.push(Line::from(Span::styled(
                format!("[ {} ]", item.display),
                Style::default().fg(palette.border_focus),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                format!("  {}  ", item.display),
                Style::default().fg(palette.header),
            )));
        }
    }

    let inner_width = lines
        .iter()
        .map(|l| {
            l.spans
                .iter()
                .map(|s| s.content.width())
                .sum::<usize>()
        })
        .max()
        .unwrap_or(0) as u16;
    let popup_width = (inner_width + 4).min(area.width);
    let popup_height = (lines.len() as u16 + 2).min(area.height);
    let popup = centered(area, popup_width, popup_height);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border_focus));

    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay_with(n: usize) -> CompletionOverlay {
        let mut overlay = CompletionOverlay::default();
        let items = (0..n)
            .map(|i| Completion {
                value: format!("v{}", i),
                display: format!("d{}", i),
            })
            .collect();
        overlay.open(items, None);
        overlay
    }

    #[test]
    fn cursor_wraps_both_ways() {
        let mut overlay = overlay_with(3);
        overlay.cursor_back();
        assert_eq!(overlay.cursor, 2);
        overlay.cursor_forward();
        assert_eq!(overlay.cursor, 0);
        overlay.cursor_forward();
        assert_eq!(overlay.cursor, 1);
    }

    #[test]
    fn empty_overlay_has_no_selection() {
        let mut overlay = CompletionOverlay::default();
        overlay.open(Vec::new(), Some("boom".into()));
        overlay.cursor_forward();
        overlay.cursor_back();
        assert!(overlay.selected().is_none());
        assert_eq!(overlay.error.as_deref(), Some("boom"));
    }

    #[test]
    fn close_clears_state() {
        let mut overlay = overlay_with(2);
        overlay.close();
        assert!(!overlay.active);
        assert!(overlay.items.is_empty());
    }
}
