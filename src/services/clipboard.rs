//! Clipboard: system clipboard access with an internal fallback.
//!
//! Copying tries OSC 52 escape sequences first (handled natively by most
//! modern terminals) and arboard second (X11/Wayland APIs for terminals
//! without OSC 52 support). Reading goes through arboard with the
//! internal buffer as fallback. All failures are reported to the caller,
//! never propagated.

use crossterm::clipboard::CopyToClipboard;
use crossterm::execute;
use std::io::{stdout, Write};
use std::sync::Mutex;

/// Keeps X11 clipboard ownership alive for the application lifetime; on
/// X11 the owner must stay around to answer paste requests.
static SYSTEM_CLIPBOARD: Mutex<Option<arboard::Clipboard>> = Mutex::new(None);

#[derive(Debug, Default)]
pub struct Clipboard {
    /// Internal clipboard content (always available)
    internal: String,
    /// When true, skip the system clipboard entirely (for testing)
    internal_only: bool,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn internal_only() -> Self {
        Clipboard {
            internal: String::new(),
            internal_only: true,
        }
    }

    /// Copy text to the system clipboard. Returns Err with a description
    /// when no system clipboard path worked; the internal buffer is
    /// updated either way.
    pub fn copy(&mut self, text: String) -> Result<(), String> {
        self.internal = text.clone();
        if self.internal_only {
            return Ok(());
        }

        // OSC 52 has no detectable failure mode; an Err here means the
        // write itself failed.
        let osc52_ok = execute!(stdout(), CopyToClipboard::to_clipboard_from(&text)).is_ok();
        let _ = stdout().flush();

        let mut arboard_error = None;
        match SYSTEM_CLIPBOARD.lock() {
            Ok(mut guard) => {
                if guard.is_none() {
                    match arboard::Clipboard::new() {
                        Ok(cb) => *guard = Some(cb),
                        Err(e) => {
                            tracing::debug!("arboard clipboard init failed: {}", e);
                            arboard_error = Some(e.to_string());
                        }
                    }
                }
                if let Some(clipboard) = guard.as_mut() {
                    if let Err(e) = clipboard.set_text(&text) {
                        tracing::debug!("arboard copy failed: {}", e);
                        arboard_error = Some(e.to_string());
                    } else {
                        arboard_error = None;
                    }
                }
            }
            Err(_) => arboard_error = Some("clipboard mutex poisoned".to_string()),
        }

        match (osc52_ok, arboard_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Get text from the clipboard, preferring the system clipboard.
    pub fn paste(&mut self) -> Option<String> {
        if !self.internal_only {
            if let Ok(mut guard) = SYSTEM_CLIPBOARD.lock() {
                if guard.is_none() {
                    if let Ok(cb) = arboard::Clipboard::new() {
                        *guard = Some(cb);
                    }
                }
                if let Some(clipboard) = guard.as_mut() {
                    if let Ok(text) = clipboard.get_text() {
                        if !text.is_empty() {
                            self.internal = text.clone();
                            return Some(text);
                        }
                    }
                }
            }
        }

        if self.internal.is_empty() {
            None
        } else {
            Some(self.internal.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_updates_internal_buffer() {
        let mut clipboard = Clipboard::internal_only();
        clipboard.copy("hello".to_string()).unwrap();
        assert_eq!(clipboard.paste(), Some("hello".to_string()));
    }

    #[test]
    fn empty_internal_paste_is_none() {
        let mut clipboard = Clipboard::internal_only();
        assert_eq!(clipboard.paste(), None);
    }
}
