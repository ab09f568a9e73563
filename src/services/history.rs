//! File-backed command history with filtered recall.
//!
//! The history file holds one entry per line, oldest first. Every push
//! re-reads and rewrites the whole file, so concurrent shells sharing a
//! data dir converge on last-writer-wins. The recall cursor and filter
//! are transient and never persisted.

use std::fs;
use std::path::PathBuf;

pub struct History {
    path: PathBuf,
    max_len: usize,
    filter: String,
    /// Recall cursor into the stored list; `None` means "past the end".
    peek_index: Option<usize>,
}

impl History {
    pub fn new(path: PathBuf, max_len: usize) -> Self {
        History {
            path,
            max_len,
            filter: String::new(),
            peek_index: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.max_len > 0
    }

    fn load(&self) -> Vec<String> {
        match fs::read_to_string(&self.path) {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(_) => {
                if let Some(parent) = self.path.parent() {
                    let _ = fs::create_dir_all(parent);
                }
                Vec::new()
            }
        }
    }

    fn store(&self, lines: &[String]) {
        let mut out = String::new();
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
        let _ = fs::write(&self.path, out);
    }

    /// Append a line: drop the head at capacity, remove the most recent
    /// prior copy so the newest position wins, persist.
    pub fn push(&mut self, line: &str) {
        if !self.enabled() {
            return;
        }

        self.filter.clear();
        self.peek_index = None;

        let mut lines = self.load();
        if lines.len() >= self.max_len {
            lines.remove(0);
        }
        if let Some(pos) = lines.iter().rposition(|stored| stored == line) {
            lines.remove(pos);
        }
        lines.push(line.to_string());
        self.store(&lines);
    }

    /// Set the substring filter and reset the recall cursor.
    pub fn set_filter(&mut self, filter: &str) {
        self.filter = filter.to_string();
        self.peek_index = None;
    }

    /// The nearest earlier line containing the filter. When no earlier
    /// match exists the current match (if any) is returned again.
    pub fn peek(&mut self) -> String {
        if !self.enabled() {
            return String::new();
        }

        let lines = self.load();
        let start = self.peek_index.unwrap_or(lines.len());

        for i in (0..start).rev() {
            if lines[i].contains(&self.filter) {
                self.peek_index = Some(i);
                return lines[i].clone();
            }
        }

        match self.peek_index {
            Some(i) if i > 0 && i < lines.len() => lines[i].clone(),
            _ => String::new(),
        }
    }

    /// The nearest later line containing the filter; exhaustion returns
    /// empty and resets the cursor past the end.
    pub fn peek_reverse(&mut self) -> String {
        if !self.enabled() {
            return String::new();
        }

        let lines = self.load();
        let Some(start) = self.peek_index else {
            return String::new();
        };
        if start >= lines.len() {
            self.peek_index = None;
            return String::new();
        }

        for (i, line) in lines.iter().enumerate().skip(start + 1) {
            if line.contains(&self.filter) {
                self.peek_index = Some(i);
                return line.clone();
            }
        }

        self.peek_index = None;
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn history(max_len: usize) -> (TempDir, History) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.txt");
        (tmp, History::new(path, max_len))
    }

    #[test]
    fn push_then_peek_returns_the_line() {
        let (_tmp, mut h) = history(10);
        h.push("git status");
        h.set_filter("git");
        assert_eq!(h.peek(), "git status");
    }

    #[test]
    fn duplicate_push_keeps_one_copy_at_newest_position() {
        let (_tmp, mut h) = history(10);
        h.push("ls");
        h.push("pwd");
        h.push("ls");

        let stored = fs::read_to_string(h.path.clone()).unwrap();
        assert_eq!(stored, "pwd\nls\n");
    }

    #[test]
    fn capacity_overflow_drops_oldest() {
        let (_tmp, mut h) = history(3);
        for line in ["a", "b", "c", "d"] {
            h.push(line);
        }
        let stored = fs::read_to_string(h.path.clone()).unwrap();
        assert!(!stored.contains("a\n"));
        assert_eq!(stored, "b\nc\nd\n");
    }

    #[test]
    fn file_is_newline_terminated_oldest_first() {
        let (_tmp, mut h) = history(10);
        h.push("first");
        h.push("second");
        let stored = fs::read_to_string(h.path.clone()).unwrap();
        assert_eq!(stored, "first\nsecond\n");
    }

    #[test]
    fn recall_walks_backwards_with_filter() {
        let (_tmp, mut h) = history(10);
        h.push("make test");
        h.push("git status");
        h.push("cargo build");
        h.push("git push");

        h.set_filter("git");
        assert_eq!(h.peek(), "git push");
        assert_eq!(h.peek(), "git status");
        // Exhausted going back: the current match is held.
        assert_eq!(h.peek(), "git status");
    }

    #[test]
    fn reverse_recall_walks_forward_and_resets_on_exhaustion() {
        let (_tmp, mut h) = history(10);
        h.push("one");
        h.push("two");
        h.push("three");

        h.set_filter("");
        assert_eq!(h.peek(), "three");
        assert_eq!(h.peek(), "two");
        assert_eq!(h.peek_reverse(), "three");
        assert_eq!(h.peek_reverse(), "");
        // After the reset, reverse recall has nothing to return.
        assert_eq!(h.peek_reverse(), "");
    }

    #[test]
    fn zero_capacity_disables_everything() {
        let (tmp, mut h) = history(0);
        h.push("ls");
        assert_eq!(h.peek(), "");
        assert!(!tmp.path().join("history.txt").exists());
    }

    #[test]
    fn push_resets_filter_and_cursor() {
        let (_tmp, mut h) = history(10);
        h.push("alpha");
        h.push("beta");
        h.set_filter("alpha");
        assert_eq!(h.peek(), "alpha");
        h.push("gamma");
        // Filter was cleared by the push, so recall starts from the end.
        assert_eq!(h.peek(), "gamma");
    }
}
