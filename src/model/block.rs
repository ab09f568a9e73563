//! Command block: one execution unit and its accumulated state.

use std::io::Write;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use portable_pty::{Child, MasterPty};

/// Lifecycle of a block. Terminal states are absorbing; `DirectMode` is
/// only entered from `Running` and resolves to `Succeeded` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Running,
    Succeeded,
    Failed,
    Cancelled,
    DirectMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyStatus {
    #[default]
    None,
    Success,
    Failure,
}

/// A single command execution in a virtual TTY.
///
/// The engine owns the ordered block list and refers to blocks by id;
/// readers carry the id only, never a handle to the block.
pub struct CommandBlock {
    pub id: u64,
    /// The user-entered line after alias expansion.
    pub command: String,
    /// The prompt string frozen at submission time.
    pub prompt_snapshot: String,
    pub start_time: Instant,
    pub end_time: Option<Instant>,
    /// Everything read from the PTY master, append-only.
    pub output: Vec<u8>,
    pub state: BlockState,
    /// `-1` while running, `130` for user-cancelled, otherwise the
    /// child's exit status.
    pub exit_code: i32,
    pub copy_status: CopyStatus,
    pub copy_error: Option<String>,
    pub focused: bool,
    pub uses_alt_screen: bool,
    pub in_direct_mode: bool,

    pub child: Option<Box<dyn Child + Send + Sync>>,
    pub master: Option<Box<dyn MasterPty + Send>>,
    pub writer: Option<Box<dyn Write + Send>>,
    /// Acknowledgement channel that releases the reader's next read.
    pub reader_ack: Option<Sender<()>>,
}

impl CommandBlock {
    pub fn new(id: u64, command: String, prompt_snapshot: String) -> Self {
        CommandBlock {
            id,
            command,
            prompt_snapshot,
            start_time: Instant::now(),
            end_time: None,
            output: Vec::new(),
            state: BlockState::Running,
            exit_code: -1,
            copy_status: CopyStatus::None,
            copy_error: None,
            focused: false,
            uses_alt_screen: false,
            in_direct_mode: false,
            child: None,
            master: None,
            writer: None,
            reader_ack: None,
        }
    }

    /// True while the block owns a live child, including direct mode.
    pub fn is_active(&self) -> bool {
        matches!(self.state, BlockState::Running | BlockState::DirectMode)
    }

    /// True for blocks that can be focused and receive PTY input.
    pub fn is_running(&self) -> bool {
        self.state == BlockState::Running
    }

    /// Move to a terminal state, recording the exit code and end time.
    pub fn finish(&mut self, state: BlockState, exit_code: i32) {
        debug_assert!(matches!(
            state,
            BlockState::Succeeded | BlockState::Failed | BlockState::Cancelled
        ));
        self.state = state;
        self.exit_code = exit_code;
        self.end_time = Some(Instant::now());
        self.focused = false;
        self.in_direct_mode = false;
    }

    /// Drop the PTY handles. The reader notices the closed master and
    /// the dropped ack channel and stops on its own.
    pub fn release_pty(&mut self) {
        self.reader_ack = None;
        self.writer = None;
        self.master = None;
    }

    pub fn elapsed(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    pub fn append_output(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    pub fn append_line(&mut self, text: &str) {
        self.output.extend_from_slice(text.as_bytes());
        self.output.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_block_is_running_with_sentinel_exit_code() {
        let block = CommandBlock::new(1, "ls".into(), "~".into());
        assert_eq!(block.state, BlockState::Running);
        assert_eq!(block.exit_code, -1);
        assert!(block.end_time.is_none());
        assert!(block.is_running());
    }

    #[test]
    fn finish_sets_end_time_and_clears_focus() {
        let mut block = CommandBlock::new(1, "ls".into(), "~".into());
        block.focused = true;
        block.finish(BlockState::Succeeded, 0);
        assert_eq!(block.state, BlockState::Succeeded);
        assert_eq!(block.exit_code, 0);
        assert!(block.end_time.is_some());
        assert!(!block.focused);
        assert!(!block.is_active());
    }

    #[test]
    fn direct_mode_counts_as_active_but_not_focusable() {
        let mut block = CommandBlock::new(1, "vim".into(), "~".into());
        block.state = BlockState::DirectMode;
        block.in_direct_mode = true;
        assert!(block.is_active());
        assert!(!block.is_running());
    }
}
