//! Replay compiler for terminal output.
//!
//! Takes a raw byte stream containing cursor-motion, erase, and SGR
//! sequences and produces a flat string that already reflects every
//! overwrite, so a progress bar that redrew itself fifty times renders
//! as its final frame instead of fifty frames of escape noise.
//!
//! The compiler is total: malformed or unknown sequences are dropped and
//! arbitrary input never panics.

/// A lexed unit of terminal output: either a plain character or a full
/// CSI sequence (`ESC [` through its final letter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Rune(char),
    Csi(String),
}

/// One grid cell: a character plus the SGR prefix active when it was
/// written. An empty style means the terminal default.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cell {
    rune: char,
    style: String,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            rune: ' ',
            style: String::new(),
        }
    }
}

/// Growable 2-D cell grid with cursor and current-style tracking.
struct Grid {
    cells: Vec<Vec<Cell>>,
    cursor_row: usize,
    cursor_col: usize,
    current_style: String,
    soft_wrap: usize,
}

impl Grid {
    fn new(soft_wrap: usize) -> Self {
        Grid {
            cells: Vec::new(),
            cursor_row: 0,
            cursor_col: 0,
            current_style: String::new(),
            soft_wrap,
        }
    }

    fn ensure_row(&mut self, row: usize) {
        while self.cells.len() <= row {
            self.cells.push(Vec::new());
        }
    }

    fn ensure_cell(&mut self, row: usize, col: usize) {
        self.ensure_row(row);
        while self.cells[row].len() <= col {
            self.cells[row].push(Cell::default());
        }
    }

    fn set_cursor(&mut self, row: isize, col: isize) {
        self.cursor_row = row.max(0) as usize;
        self.cursor_col = col.max(0) as usize;
    }

    fn write_rune(&mut self, r: char) {
        self.ensure_cell(self.cursor_row, self.cursor_col);
        self.cells[self.cursor_row][self.cursor_col] = Cell {
            rune: r,
            style: self.current_style.clone(),
        };
        self.cursor_col += 1;
    }
}

/// Split input into tokens. A CSI sequence starts at `ESC [` and runs
/// through the first ASCII letter; a bare `ESC` not followed by `[` is
/// passed through as a literal rune.
pub fn tokenize(input: &str) -> Vec<Token> {
    let runes: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < runes.len() {
        if runes[i] == '\x1b' && i + 1 < runes.len() && runes[i + 1] == '[' {
            let start = i;
            i += 2;
            while i < runes.len() && !runes[i].is_ascii_alphabetic() {
                i += 1;
            }
            if i < runes.len() {
                i += 1; // include the final command letter
            }
            tokens.push(Token::Csi(runes[start..i].iter().collect()));
        } else {
            tokens.push(Token::Rune(runes[i]));
            i += 1;
        }
    }

    tokens
}

/// Compile a raw output stream into its final rendered form.
///
/// `soft_wrap` is the column count at which long rows are broken with a
/// hard newline; pass the content width of the surrounding layout.
pub fn compile(input: &str, soft_wrap: usize) -> String {
    let mut grid = Grid::new(soft_wrap.max(1));

    for token in tokenize(input) {
        match token {
            Token::Rune('\n') => {
                grid.cursor_row += 1;
                grid.cursor_col = 0;
            }
            Token::Rune('\r') => {
                grid.cursor_col = 0;
            }
            Token::Rune(r) => grid.write_rune(r),
            Token::Csi(seq) => apply_csi(&mut grid, &seq),
        }
    }

    render(&grid)
}

fn apply_csi(grid: &mut Grid, sequence: &str) {
    let Some(content) = sequence.strip_prefix("\x1b[") else {
        return;
    };
    let Some(cmd) = content.chars().last() else {
        return;
    };
    let params: String = {
        let mut cs: Vec<char> = content.chars().collect();
        cs.pop();
        cs.into_iter().collect()
    };

    match cmd {
        'H' => cursor_position(grid, &params),
        'A' => {
            let n = param_or(&params, 1);
            grid.set_cursor(grid.cursor_row as isize - n, grid.cursor_col as isize);
        }
        'B' => {
            let n = param_or(&params, 1);
            grid.set_cursor(grid.cursor_row as isize + n, grid.cursor_col as isize);
        }
        'C' => {
            let n = param_or(&params, 1);
            grid.set_cursor(grid.cursor_row as isize, grid.cursor_col as isize + n);
        }
        'D' => {
            let n = param_or(&params, 1);
            grid.set_cursor(grid.cursor_row as isize, grid.cursor_col as isize - n);
        }
        'J' => erase_in_display(grid, &params),
        'K' => erase_in_line(grid, &params),
        'm' => grid.current_style.push_str(sequence),
        _ => {
            // Unknown command letters that still look like SGR are
            // treated as styling; everything else is dropped.
            if is_styling_sequence(sequence) {
                grid.current_style.push_str(sequence);
            }
        }
    }
}

fn param_or(params: &str, default: isize) -> isize {
    if params.is_empty() {
        return default;
    }
    params.parse().unwrap_or(default)
}

fn cursor_position(grid: &mut Grid, params: &str) {
    if params.is_empty() {
        grid.set_cursor(0, 0);
        return;
    }

    let mut parts = params.split(';');
    let mut row = 0isize;
    let mut col = 0isize;

    if let Some(r) = parts.next().and_then(|p| p.parse::<isize>().ok()) {
        if r > 0 {
            row = r - 1; // one-based to zero-based
        }
    }
    if let Some(c) = parts.next().and_then(|p| p.parse::<isize>().ok()) {
        if c > 0 {
            col = c - 1;
        }
    }

    grid.set_cursor(row, col);
}

fn erase_in_display(grid: &mut Grid, params: &str) {
    // An unparsable parameter falls back to 0; a parsable value outside
    // 0..=2 (negative included) matches nothing and erases nothing.
    match params.parse::<i64>().unwrap_or(0) {
        0 => {
            // Cursor to end of display: drop every row below the cursor.
            grid.cells.truncate(grid.cursor_row + 1);
        }
        1 => {
            // Start of display through the cursor row.
            let cut = (grid.cursor_row + 1).min(grid.cells.len());
            grid.cells.drain(..cut);
        }
        2 => grid.cells.clear(),
        _ => {}
    }
}

fn erase_in_line(grid: &mut Grid, params: &str) {
    grid.ensure_row(grid.cursor_row);
    let col = grid.cursor_col;
    let row = &mut grid.cells[grid.cursor_row];

    match params.parse::<i64>().unwrap_or(0) {
        0 => row.truncate(col),
        1 => {
            let cut = col.min(row.len());
            row.drain(..cut);
        }
        2 => *row = vec![Cell::default(); col],
        _ => {}
    }
}

fn is_styling_sequence(sequence: &str) -> bool {
    sequence
        .strip_prefix("\x1b[")
        .and_then(|s| s.strip_suffix('m'))
        .is_some_and(|params| params.chars().all(|c| c.is_ascii_digit() || c == ';'))
}

fn render(grid: &Grid) -> String {
    let mut out = String::new();
    let mut last_style = "";

    for (row_index, row) in grid.cells.iter().enumerate() {
        if row_index > 0 {
            out.push('\n');
        }

        // Trim trailing cells that are a plain space with no style.
        let last_non_empty = row
            .iter()
            .rposition(|cell| cell.rune != ' ' || !cell.style.is_empty());
        let Some(last_non_empty) = last_non_empty else {
            continue;
        };

        for (col_index, cell) in row.iter().enumerate().take(last_non_empty + 1) {
            if col_index != 0 && col_index % grid.soft_wrap == 0 {
                out.push('\n');
                last_style = "";
            }

            if cell.style != last_style {
                if !last_style.is_empty() {
                    out.push_str("\x1b[0m");
                }
                out.push_str(&cell.style);
                last_style = &cell.style;
            }

            out.push(cell.rune);
        }
    }

    if !last_style.is_empty() {
        out.push_str("\x1b[0m");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: usize = 80;

    #[test]
    fn tokenize_plain_text() {
        assert_eq!(tokenize("hello").len(), 5);
    }

    #[test]
    fn tokenize_text_with_sgr() {
        // h,e,l,l,o + SGR + w,o,r,l,d + SGR
        assert_eq!(tokenize("hello\x1b[31mworld\x1b[0m").len(), 12);
    }

    #[test]
    fn tokenize_cursor_movement() {
        let tokens = tokenize("\x1b[H\x1b[2;3Htest");
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0], Token::Csi("\x1b[H".into()));
        assert_eq!(tokens[1], Token::Csi("\x1b[2;3H".into()));
    }

    #[test]
    fn tokenize_bare_escape_is_literal() {
        let tokens = tokenize("a\x1bb");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], Token::Rune('\x1b'));
    }

    #[test]
    fn compile_simple_text() {
        assert_eq!(compile("hello", WIDTH), "hello");
    }

    #[test]
    fn compile_preserves_styling() {
        assert_eq!(
            compile("\x1b[31mred text\x1b[0m", WIDTH),
            "\x1b[31mred text\x1b[0m"
        );
    }

    #[test]
    fn compile_newlines() {
        assert_eq!(compile("line1\nline2", WIDTH), "line1\nline2");
    }

    #[test]
    fn compile_cursor_home_overwrite() {
        assert_eq!(compile("hello\x1b[Hworld", WIDTH), "world");
    }

    #[test]
    fn compile_cursor_positioning() {
        assert_eq!(
            compile("line1\nline2\x1b[1;3Hxxx", WIDTH),
            "lixxx\nline2"
        );
    }

    #[test]
    fn compile_cursor_up() {
        assert_eq!(
            compile("line1\nline2\x1b[A\x1b[6Gxxx", WIDTH),
            "line1xxx\nline2"
        );
    }

    #[test]
    fn compile_progress_bar_final_frame() {
        let input = "Progress: [    ]\x1b[6D\x1b[0K[█   ]\x1b[6D\x1b[0K[██  ]\x1b[6D\x1b[0K[███ ]\x1b[6D\x1b[0K[████]";
        assert_eq!(compile(input, WIDTH), "Progress: [████]");
    }

    #[test]
    fn compile_carriage_return_overwrite() {
        assert_eq!(compile("abcdef\rxyz", WIDTH), "xyzdef");
    }

    #[test]
    fn compile_erase_display_entire() {
        assert_eq!(compile("junk\x1b[2Jclean", WIDTH), "    clean");
    }

    #[test]
    fn compile_erase_line_to_end() {
        assert_eq!(compile("abcdef\x1b[3D\x1b[0K", WIDTH), "abc");
    }

    #[test]
    fn compile_cursor_backward_saturates() {
        assert_eq!(compile("X\x1b[D\x1b[D\x1b[DY", WIDTH), "Y");
    }

    #[test]
    fn compile_soft_wrap_inserts_newlines() {
        assert_eq!(compile("abcdefgh", 4), "abcd\nefgh");
    }

    #[test]
    fn compile_soft_wrap_resets_style_tracking() {
        let out = compile("\x1b[31mabcdefgh\x1b[0m", 4);
        assert_eq!(out, "\x1b[31mabcd\n\x1b[31mefgh\x1b[0m");
    }

    #[test]
    fn negative_erase_params_are_a_no_op() {
        // A parsable but out-of-range parameter matches no erase case,
        // unlike garbage, which falls back to 0.
        assert_eq!(compile("abc\x1b[-1J", WIDTH), "abc");
        assert_eq!(compile("abc\x1b[-1K", WIDTH), "abc");
        assert_eq!(compile("abc\x1b[\x07Jdef", WIDTH), "abcdef");
    }

    #[test]
    fn compile_is_total_over_garbage() {
        // Orphaned erase commands and unterminated sequences must not panic.
        for input in ["\x1b[K", "\x1b[5J", "\x1b[", "\x1b[12", "\x1b[;;;H", "\x1b"] {
            let _ = compile(input, WIDTH);
        }
    }

    #[test]
    fn compile_unknown_csi_ignored() {
        assert_eq!(compile("ab\x1b[?25lcd", WIDTH), "abcd");
    }

    #[test]
    fn style_change_emits_reset_then_new_style() {
        // `c` carries the accumulated style "\x1b[31m\x1b[0m", so the
        // renderer resets the red run before replaying it.
        assert_eq!(
            compile("\x1b[31mab\x1b[0mc", WIDTH),
            "\x1b[31mab\x1b[0m\x1b[31m\x1b[0mc\x1b[0m"
        );
    }
}
