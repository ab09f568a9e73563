//! ANSI escape code parser for rendering text with embedded control codes
//!
//! The replay compiler flattens cursor motion away but deliberately keeps
//! SGR styling inline. This module parses those styling sequences and
//! converts them into ratatui styles so block output renders with its
//! original colours.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Standard ANSI colors (codes 30-37 for fg, 40-47 for bg)
const STANDARD_COLORS: [Color; 8] = [
    Color::Black,   // 0
    Color::Red,     // 1
    Color::Green,   // 2
    Color::Yellow,  // 3
    Color::Blue,    // 4
    Color::Magenta, // 5
    Color::Cyan,    // 6
    Color::Gray,    // 7
];

/// Bright ANSI colors (codes 90-97 for fg, 100-107 for bg)
const BRIGHT_COLORS: [Color; 8] = [
    Color::DarkGray,     // 0
    Color::LightRed,     // 1
    Color::LightGreen,   // 2
    Color::LightYellow,  // 3
    Color::LightBlue,    // 4
    Color::LightMagenta, // 5
    Color::LightCyan,    // 6
    Color::White,        // 7
];

/// Parser state for ANSI escape sequences
#[derive(Debug, Clone, Default)]
pub struct AnsiParser {
    /// Current accumulated style from escape codes
    current_style: Style,
    /// Buffer for incomplete escape sequences
    escape_buffer: String,
    /// Whether we're currently inside an escape sequence
    in_escape: bool,
}

impl AnsiParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single character.
    ///
    /// Returns None if the character is part of an escape sequence and
    /// should not be displayed, or Some(style) if the character should be
    /// displayed with the given style.
    pub fn parse_char(&mut self, ch: char) -> Option<Style> {
        if self.in_escape {
            self.escape_buffer.push(ch);

            if self.is_escape_complete() {
                self.process_escape_sequence();
                self.escape_buffer.clear();
                self.in_escape = false;
            }
            None
        } else if ch == '\x1b' {
            self.in_escape = true;
            self.escape_buffer.clear();
            self.escape_buffer.push(ch);
            None
        } else {
            Some(self.current_style)
        }
    }

    fn is_escape_complete(&self) -> bool {
        if self.escape_buffer.len() < 2 {
            return false;
        }

        // CSI sequences end with a letter
        if self.escape_buffer.starts_with("\x1b[") {
            if let Some(last) = self.escape_buffer.chars().last() {
                return last.is_ascii_alphabetic();
            }
        }

        // OSC sequences end with BEL or ST
        if self.escape_buffer.starts_with("\x1b]") {
            return self.escape_buffer.ends_with('\x07') || self.escape_buffer.ends_with("\x1b\\");
        }

        // Simple two-character sequences (ESC followed by a single char)
        if self.escape_buffer.len() == 2 {
            let second = self.escape_buffer.chars().nth(1).unwrap();
            return second != '[' && second != ']';
        }

        // For safety, limit buffer size
        self.escape_buffer.len() > 32
    }

    fn process_escape_sequence(&mut self) {
        // Only CSI SGR sequences affect styling
        if !self.escape_buffer.starts_with("\x1b[") || !self.escape_buffer.ends_with('m') {
            return;
        }

        let params_end = self.escape_buffer.len() - 1;
        let params_str = self.escape_buffer[2..params_end].to_string();
        self.parse_sgr_params(&params_str);
    }

    fn parse_sgr_params(&mut self, params_str: &str) {
        if params_str.is_empty() {
            // ESC[m is equivalent to ESC[0m (reset)
            self.current_style = Style::default();
            return;
        }

        let params: Vec<u8> = params_str
            .split(';')
            .filter_map(|s| s.parse().ok())
            .collect();

        let mut i = 0;
        while i < params.len() {
            let code = params[i];
            match code {
                0 => self.current_style = Style::default(),

                1 => self.current_style = self.current_style.add_modifier(Modifier::BOLD),
                2 => self.current_style = self.current_style.add_modifier(Modifier::DIM),
                3 => self.current_style = self.current_style.add_modifier(Modifier::ITALIC),
                4 => self.current_style = self.current_style.add_modifier(Modifier::UNDERLINED),
                5 => self.current_style = self.current_style.add_modifier(Modifier::SLOW_BLINK),
                7 => self.current_style = self.current_style.add_modifier(Modifier::REVERSED),
                8 => self.current_style = self.current_style.add_modifier(Modifier::HIDDEN),
                9 => self.current_style = self.current_style.add_modifier(Modifier::CROSSED_OUT),

                21 => self.current_style = self.current_style.remove_modifier(Modifier::BOLD),
                22 => {
                    self.current_style = self
                        .current_style
                        .remove_modifier(Modifier::BOLD)
                        .remove_modifier(Modifier::DIM)
                }
                23 => self.current_style = self.current_style.remove_modifier(Modifier::ITALIC),
                24 => self.current_style = self.current_style.remove_modifier(Modifier::UNDERLINED),
                25 => self.current_style = self.current_style.remove_modifier(Modifier::SLOW_BLINK),
                27 => self.current_style = self.current_style.remove_modifier(Modifier::REVERSED),
                28 => self.current_style = self.current_style.remove_modifier(Modifier::HIDDEN),
                29 => {
                    self.current_style = self.current_style.remove_modifier(Modifier::CROSSED_OUT)
                }

                30..=37 => {
                    self.current_style =
                        self.current_style.fg(STANDARD_COLORS[(code - 30) as usize])
                }
                38 => i += Self::parse_extended_color(&params[i..], &mut self.current_style, true),
                39 => self.current_style = self.current_style.fg(Color::Reset),

                40..=47 => {
                    self.current_style =
                        self.current_style.bg(STANDARD_COLORS[(code - 40) as usize])
                }
                48 => i += Self::parse_extended_color(&params[i..], &mut self.current_style, false),
                49 => self.current_style = self.current_style.bg(Color::Reset),

                90..=97 => {
                    self.current_style = self.current_style.fg(BRIGHT_COLORS[(code - 90) as usize])
                }
                100..=107 => {
                    self.current_style = self.current_style.bg(BRIGHT_COLORS[(code - 100) as usize])
                }

                _ => {} // Ignore unknown codes
            }
            i += 1;
        }
    }

    /// Parse extended color sequences (256-color or RGB).
    /// Returns the number of additional parameters consumed.
    fn parse_extended_color(params: &[u8], style: &mut Style, is_foreground: bool) -> usize {
        if params.len() < 2 {
            return 0;
        }

        match params[1] {
            // 256-color mode: code;5;n
            5 if params.len() >= 3 => {
                let color = Color::Indexed(params[2]);
                *style = if is_foreground {
                    style.fg(color)
                } else {
                    style.bg(color)
                };
                2
            }
            // RGB mode: code;2;r;g;b
            2 if params.len() >= 5 => {
                let color = Color::Rgb(params[2], params[3], params[4]);
                *style = if is_foreground {
                    style.fg(color)
                } else {
                    style.bg(color)
                };
                4
            }
            _ => 0,
        }
    }
}

/// Convert a multi-line string with embedded SGR sequences into ratatui
/// lines. Styles carry across newlines, matching how the replay compiler
/// emits them.
pub fn styled_lines(text: &str) -> Vec<Line<'static>> {
    let mut parser = AnsiParser::new();
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut run = String::new();
    let mut run_style = Style::default();

    for ch in text.chars() {
        if ch == '\n' {
            if !run.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut run), run_style));
            }
            lines.push(Line::from(std::mem::take(&mut spans)));
            continue;
        }

        match parser.parse_char(ch) {
            Some(style) => {
                if style != run_style && !run.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut run), run_style));
                }
                run_style = style;
                run.push(ch);
            }
            None => {} // part of an escape sequence
        }
    }

    if !run.is_empty() {
        spans.push(Span::styled(run, run_style));
    }
    lines.push(Line::from(spans));

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_plain_text_single_line() {
        let lines = styled_lines("Hello, world!");
        assert_eq!(flat(&lines), vec!["Hello, world!"]);
        assert_eq!(lines[0].spans[0].style, Style::default());
    }

    #[test]
    fn test_red_segment() {
        let lines = styled_lines("\x1b[31mRed\x1b[0m");
        assert_eq!(flat(&lines), vec!["Red"]);
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn test_multiple_colors() {
        let lines = styled_lines("\x1b[31mRed\x1b[32mGreen\x1b[0mNormal");
        assert_eq!(lines[0].spans.len(), 3);
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Red));
        assert_eq!(lines[0].spans[1].style.fg, Some(Color::Green));
        assert_eq!(lines[0].spans[2].style.fg, None);
    }

    #[test]
    fn test_style_carries_across_newline() {
        let lines = styled_lines("\x1b[31mab\ncd\x1b[0m");
        assert_eq!(flat(&lines), vec!["ab", "cd"]);
        assert_eq!(lines[1].spans[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn test_bold() {
        let lines = styled_lines("\x1b[1mBold\x1b[0m");
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_256_color() {
        let lines = styled_lines("\x1b[38;5;196mRed256\x1b[0m");
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Indexed(196)));
    }

    #[test]
    fn test_rgb_color() {
        let lines = styled_lines("\x1b[38;2;255;128;0mOrange\x1b[0m");
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Rgb(255, 128, 0)));
    }

    #[test]
    fn test_bright_colors() {
        let lines = styled_lines("\x1b[91mBrightRed\x1b[0m");
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::LightRed));
    }

    #[test]
    fn test_combined_attributes() {
        let lines = styled_lines("\x1b[1;31;4mx\x1b[0m");
        let style = lines[0].spans[0].style;
        assert_eq!(style.fg, Some(Color::Red));
        assert!(style.add_modifier.contains(Modifier::BOLD));
        assert!(style.add_modifier.contains(Modifier::UNDERLINED));
    }

    #[test]
    fn test_background_color() {
        let lines = styled_lines("\x1b[44mBlueBackground\x1b[0m");
        assert_eq!(lines[0].spans[0].style.bg, Some(Color::Blue));
    }
}
