//! Terminal mode management: raw mode, alternate screen, mouse capture,
//! and bracketed paste.
//!
//! `TerminalModes::enable` tracks exactly which modes were switched on
//! so `undo` (also run on Drop) restores only those. `emergency_cleanup`
//! is for the panic hook, where no instance is reachable.

use anyhow::Result;
use crossterm::{
    event::{
        DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    },
    terminal::{
        disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
    },
    ExecutableCommand,
};
use std::io::{stdout, Write};

#[derive(Debug, Default)]
pub struct TerminalModes {
    raw_mode: bool,
    alternate_screen: bool,
    mouse_capture: bool,
    bracketed_paste: bool,
}

impl TerminalModes {
    /// Enable all modes. Raw mode and the alternate screen are required;
    /// mouse capture and bracketed paste degrade gracefully.
    pub fn enable() -> Result<Self> {
        let mut modes = Self::default();

        enable_raw_mode()?;
        modes.raw_mode = true;

        if let Err(e) = stdout().execute(EnterAlternateScreen) {
            modes.undo();
            return Err(e.into());
        }
        modes.alternate_screen = true;

        if let Err(e) = stdout().execute(EnableMouseCapture) {
            tracing::warn!("failed to enable mouse capture: {}", e);
        } else {
            modes.mouse_capture = true;
        }

        if let Err(e) = stdout().execute(EnableBracketedPaste) {
            tracing::warn!("failed to enable bracketed paste: {}", e);
        } else {
            modes.bracketed_paste = true;
        }

        Ok(modes)
    }

    /// Restore the terminal. Safe to call multiple times.
    pub fn undo(&mut self) {
        if self.mouse_capture {
            let _ = stdout().execute(DisableMouseCapture);
            self.mouse_capture = false;
        }
        if self.bracketed_paste {
            let _ = stdout().execute(DisableBracketedPaste);
            self.bracketed_paste = false;
        }
        if self.raw_mode {
            let _ = disable_raw_mode();
            self.raw_mode = false;
        }
        if self.alternate_screen {
            let _ = stdout().execute(LeaveAlternateScreen);
            self.alternate_screen = false;
        }
        let _ = stdout().flush();
    }

}

/// Temporarily hand the real terminal to a direct-mode child.
pub fn suspend_for_direct_mode() {
    let _ = stdout().execute(DisableMouseCapture);
    let _ = disable_raw_mode();
    let _ = stdout().execute(LeaveAlternateScreen);
    let _ = stdout().flush();
}

/// Take the terminal back after a direct-mode child exits.
pub fn resume_after_direct_mode() {
    let _ = stdout().execute(EnterAlternateScreen);
    let _ = enable_raw_mode();
    let _ = stdout().execute(EnableMouseCapture);
    let _ = stdout().flush();
}

impl Drop for TerminalModes {
    fn drop(&mut self) {
        self.undo();
    }
}

/// Unconditional restore for the panic hook.
pub fn emergency_cleanup() {
    let _ = stdout().execute(DisableMouseCapture);
    let _ = stdout().execute(DisableBracketedPaste);
    let _ = disable_raw_mode();
    let _ = stdout().execute(LeaveAlternateScreen);
    let _ = stdout().flush();
}
