//! Engine / UI controller.
//!
//! Owns the block list, focus, viewport scroll state, the completion
//! overlay, and the input editor. All state mutation happens here on the
//! UI thread in response to key/mouse events and `EngineEvent` messages
//! from background workers; errors are reified into block output or
//! overlay state, never propagated out of a handler.

pub mod fullscreen;

use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use ratatui::text::{Line, Text};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::config::{Config, Palette};
use crate::input::editor::VimInput;
use crate::model::block::{BlockState, CommandBlock, CopyStatus};
use crate::model::event::EngineEvent;
use crate::services::clipboard::Clipboard;
use crate::services::history::History;
use crate::services::ipc::{IpcEndpoint, SharedCwd};
use crate::services::{completion, osc, prompt, pty, shell, terminal_modes, terminator};
use crate::view::blocks::{self as block_view, Hotspot, HotspotKind};
use crate::view::overlay::CompletionOverlay;

/// Rows reserved below the viewport for the prompt and the input line.
const INPUT_AREA_HEIGHT: u16 = 2;

pub struct App {
    config: Config,
    palette: Palette,
    pub blocks: Vec<CommandBlock>,
    next_id: u64,
    focused: Option<u64>,
    input: VimInput,
    completion: CompletionOverlay,
    history: History,
    clipboard: Clipboard,
    ipc_endpoint: IpcEndpoint,
    cwd: SharedCwd,
    events_tx: Sender<EngineEvent>,

    banner: Option<String>,
    prompt_cache: String,
    width: u16,
    height: u16,
    scroll_offset: usize,
    user_scrolling: bool,
    spinner_frame: usize,

    should_quit: bool,
    exit_code: i32,
    full_redraw: bool,

    hotspots: Vec<Hotspot>,
    viewport_area: Rect,

    last_title: String,
    last_cwd_report: String,
    prompt_end_pending: bool,
}

impl App {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        history: History,
        clipboard: Clipboard,
        ipc_endpoint: IpcEndpoint,
        cwd: SharedCwd,
        events_tx: Sender<EngineEvent>,
        width: u16,
        height: u16,
    ) -> Self {
        let palette = Palette::from_config(&config.ui);
        let mut app = App {
            config,
            palette,
            blocks: Vec::new(),
            next_id: 1,
            focused: None,
            input: VimInput::new(),
            completion: CompletionOverlay::default(),
            history,
            clipboard,
            ipc_endpoint,
            cwd,
            events_tx,
            banner: None,
            prompt_cache: String::new(),
            width,
            height,
            scroll_offset: 0,
            user_scrolling: false,
            spinner_frame: 0,
            should_quit: false,
            exit_code: 0,
            full_redraw: false,
            hotspots: Vec::new(),
            viewport_area: Rect::default(),
            last_title: String::new(),
            last_cwd_report: String::new(),
            prompt_end_pending: true,
        };
        app.refresh_prompt();
        app
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn request_exit(&mut self, code: i32) {
        self.exit_code = code;
        self.should_quit = true;
    }

    pub fn take_full_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.full_redraw)
    }

    fn current_cwd(&self) -> PathBuf {
        self.cwd
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|_| PathBuf::from("."))
    }

    fn refresh_prompt(&mut self) {
        self.prompt_cache = prompt::get(&self.current_cwd());
    }

    fn block_index(&self, id: u64) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    fn set_focus(&mut self, target: Option<u64>) {
        for block in &mut self.blocks {
            block.focused = Some(block.id) == target;
        }
        self.focused = target;
    }

    fn pty_size(&self) -> portable_pty::PtySize {
        pty::size(self.width.saturating_sub(2).max(20), self.height.max(4))
    }

    /// Environment overlay for children: config `shell.env` plus the
    /// current terminal geometry.
    fn child_env(&self) -> Vec<(String, String)> {
        let mut env = self.config.env_overlay();
        env.push(("COLUMNS".into(), self.width.saturating_sub(2).to_string()));
        env.push(("LINES".into(), self.height.to_string()));
        env
    }

    // ------------------------------------------------------------------
    // Key dispatch
    // ------------------------------------------------------------------

    pub fn handle_key(&mut self, key: KeyEvent) {
        let code = key.code;
        let modifiers = key.modifiers;

        // 1. The completion overlay swallows everything while open.
        if self.completion.active {
            match code {
                KeyCode::Esc => self.completion.close(),
                KeyCode::Enter => {
                    if let Some(candidate) = self.completion.selected() {
                        let value = candidate.value.clone();
                        self.input.insert_text(&value);
                    }
                    self.completion.close();
                }
                KeyCode::Tab | KeyCode::Up => self.completion.cursor_back(),
                KeyCode::Down => self.completion.cursor_forward(),
                _ => {}
            }
            return;
        }

        let scroll_key = matches!(
            code,
            KeyCode::PageUp | KeyCode::PageDown | KeyCode::Home | KeyCode::End
        ) && modifiers.is_empty();

        // 2. Scroll keys drive the viewport while no block is focused.
        if self.focused.is_none() && scroll_key {
            self.user_scrolling = true;
            self.scroll_viewport(code);
            return;
        }
        if !scroll_key {
            self.user_scrolling = false;
        }

        // 3. Enter submits a non-empty input line.
        if code == KeyCode::Enter && modifiers.is_empty() {
            let line = self.input.value().trim().to_string();
            if !line.is_empty() {
                self.submit(&line);
                return;
            }
        }

        // 4. Esc clears block focus.
        if code == KeyCode::Esc {
            if self.focused.is_some() {
                self.set_focus(None);
                return;
            }
            self.input
                .handle_key(code, modifiers, &mut self.history, &mut self.clipboard);
            return;
        }

        // 5. Tab opens the completion overlay.
        if code == KeyCode::Tab && self.focused.is_none() {
            self.open_completion();
            return;
        }

        // 6. Ctrl+Up/Ctrl+Down cycle focus among running blocks.
        if modifiers.contains(KeyModifiers::CONTROL) {
            if code == KeyCode::Up {
                self.cycle_focus(true);
                return;
            }
            if code == KeyCode::Down {
                self.cycle_focus(false);
                return;
            }
        }

        // 7. A focused running block receives the keystroke on its PTY.
        if let Some(id) = self.focused {
            if let Some(idx) = self.block_index(id) {
                if self.blocks[idx].is_running() {
                    if let Some(bytes) = pty::key_to_pty_bytes(code, modifiers) {
                        self.write_to_block_pty(idx, &bytes);
                    }
                    return;
                }
            }
        }

        // 8. Everything else edits the input line.
        self.input
            .handle_key(code, modifiers, &mut self.history, &mut self.clipboard);
    }

    fn scroll_viewport(&mut self, code: KeyCode) {
        let page = self.viewport_area.height.max(1) as usize;
        match code {
            KeyCode::PageUp => self.scroll_offset = self.scroll_offset.saturating_sub(page),
            KeyCode::PageDown => self.scroll_offset += page,
            KeyCode::Home => self.scroll_offset = 0,
            KeyCode::End => self.scroll_offset = usize::MAX,
            _ => {}
        }
        // Clamped against the composed content length on the next render.
    }

    fn open_completion(&mut self) {
        let line = self.input.value();
        let cursor = self.input.cursor();
        match completion::get_completions(&self.config.shell.completion, &line, cursor) {
            Ok(items) => self.completion.open(items, None),
            Err(e) => self.completion.open(Vec::new(), Some(e.to_string())),
        }
    }

    fn cycle_focus(&mut self, most_recent_first: bool) {
        let mut running: Vec<u64> = self
            .blocks
            .iter()
            .filter(|b| b.is_running())
            .map(|b| b.id)
            .collect();
        if running.is_empty() {
            return;
        }
        if most_recent_first {
            running.reverse();
        }

        let next = match self.focused.and_then(|id| running.iter().position(|&r| r == id)) {
            Some(idx) => running[(idx + 1) % running.len()],
            None => running[0],
        };
        self.set_focus(Some(next));
    }

    fn write_to_block_pty(&mut self, idx: usize, bytes: &[u8]) {
        let write_error = {
            let block = &mut self.blocks[idx];
            match block.writer.as_mut() {
                Some(writer) => writer
                    .write_all(bytes)
                    .and_then(|_| writer.flush())
                    .err()
                    .map(|e| e.to_string()),
                None => None,
            }
        };
        if let Some(e) = write_error {
            self.blocks[idx].append_line(&format!("Error sending input: {}", e));
        }
    }

    /// Bracketed paste: into the focused block's PTY verbatim, otherwise
    /// into the input editor.
    pub fn handle_paste(&mut self, text: String) {
        if let Some(id) = self.focused {
            if let Some(idx) = self.block_index(id) {
                if self.blocks[idx].is_running() {
                    self.write_to_block_pty(idx, text.as_bytes());
                    return;
                }
            }
        }
        self.input.insert_text(&text);
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    fn submit(&mut self, raw: &str) {
        self.input.reset();
        self.history.push(raw);
        self.refresh_prompt();

        // Single first-word alias substitution.
        let mut words: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
        let Some(first) = words.first().cloned() else {
            return;
        };
        let command = match self.config.shell.alias.get(&first) {
            Some(replacement) => {
                words[0] = replacement.clone();
                words.join(" ")
            }
            None => raw.to_string(),
        };
        let first = words[0].clone();

        if first == "clear" {
            self.clear_blocks();
            return;
        }

        if first == "!" {
            let stripped = command.get(2..).unwrap_or("").to_string();
            self.launch_direct(stripped);
            return;
        }

        if fullscreen::is_full_screen_app(&first) {
            self.launch_direct(command);
            return;
        }

        let word_refs: Vec<&str> = words.iter().map(String::as_str).collect();
        if fullscreen::matches_complex_rules(&word_refs) {
            self.launch_direct(command);
        } else {
            self.launch_block(command);
        }
    }

    fn launch_block(&mut self, command: String) {
        let id = self.next_id;
        let mut block = CommandBlock::new(id, command.clone(), self.prompt_cache.clone());

        let invocation = shell::build_invocation(&self.config.shell, &self.ipc_endpoint, &command);
        match pty::spawn(
            &invocation,
            &self.child_env(),
            &self.current_cwd(),
            self.pty_size(),
            id,
            self.events_tx.clone(),
        ) {
            Ok(spawned) => {
                block.child = Some(spawned.child);
                block.master = Some(spawned.master);
                block.writer = Some(spawned.writer);
                block.reader_ack = Some(spawned.reader_ack);
            }
            Err(e) => {
                block.append_line(&format!("Error: {}", e));
                block.finish(BlockState::Failed, -1);
            }
        }

        self.blocks.push(block);
        self.next_id += 1;
    }

    fn launch_direct(&mut self, command: String) {
        let id = self.next_id;
        let mut block = CommandBlock::new(id, command, self.prompt_cache.clone());
        block.state = BlockState::DirectMode;
        block.uses_alt_screen = true;
        block.in_direct_mode = true;
        block.append_line("[Running in full-screen mode...]");
        self.blocks.push(block);
        self.next_id += 1;

        self.run_direct(id);
    }

    /// Run the block's command as a foreground child that owns the real
    /// terminal. Blocks the UI loop for the child's lifetime.
    fn run_direct(&mut self, id: u64) {
        let Some(idx) = self.block_index(id) else {
            return;
        };
        let command = self.blocks[idx].command.clone();
        let invocation = shell::build_invocation(&self.config.shell, &self.ipc_endpoint, &command);
        let cwd = self.current_cwd();
        let env = self.child_env();

        terminal_modes::suspend_for_direct_mode();
        let status = std::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&cwd)
            .envs(env)
            .status();
        terminal_modes::resume_after_direct_mode();
        self.full_redraw = true;

        let exit_code = match status {
            Ok(status) => status.code().unwrap_or(1),
            Err(e) => {
                self.blocks[idx].append_line(&format!("Error: {}", e));
                1
            }
        };
        self.handle_direct_finished(id, exit_code);
    }

    pub fn handle_direct_finished(&mut self, id: u64, exit_code: i32) {
        if let Some(idx) = self.block_index(id) {
            let block = &mut self.blocks[idx];
            if block.state == BlockState::DirectMode {
                let state = if exit_code == 0 {
                    BlockState::Succeeded
                } else {
                    BlockState::Failed
                };
                block.finish(state, exit_code);
            }
        }
        self.refresh_prompt();
    }

    /// `clear`: terminate every block, reset ids, drop the list.
    fn clear_blocks(&mut self) {
        let mut handles = Vec::new();
        for block in &mut self.blocks {
            block.release_pty();
            if let Some(child) = block.child.take() {
                handles.push(thread::spawn(move || {
                    let _ = terminator::terminate(child);
                }));
            }
        }
        for handle in handles {
            let _ = handle.join();
        }
        self.blocks.clear();
        self.set_focus(None);
        self.next_id = 1;
        self.scroll_offset = 0;
    }

    /// Terminate every tracked child; called once on process shutdown.
    pub fn shutdown_children(&mut self) {
        let mut handles = Vec::new();
        for block in &mut self.blocks {
            if !block.is_active() {
                continue;
            }
            block.release_pty();
            if let Some(child) = block.child.take() {
                handles.push(thread::spawn(move || {
                    let _ = terminator::terminate(child);
                }));
            }
        }
        for handle in handles {
            let _ = handle.join();
        }
    }

    // ------------------------------------------------------------------
    // Engine events
    // ------------------------------------------------------------------

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Chunk { id, bytes } => self.handle_chunk(id, &bytes),
            EngineEvent::AltScreenDetected { id } => self.handle_alt_screen(id),
            EngineEvent::Finished { id } => self.handle_finished(id),
            EngineEvent::IpcExit { code } => self.request_exit(code),
            EngineEvent::IpcCwd { path } => {
                tracing::debug!("child reported cwd {}", path.display());
                self.refresh_prompt();
            }
            EngineEvent::BannerReady { text } => self.banner = Some(text),
        }
    }

    fn handle_chunk(&mut self, id: u64, bytes: &[u8]) {
        let Some(idx) = self.block_index(id) else {
            return;
        };
        let block = &mut self.blocks[idx];
        if !block.is_running() {
            return;
        }
        block.append_output(bytes);
        // Release the reader for its next read.
        if let Some(ack) = &block.reader_ack {
            let _ = ack.send(());
        }
    }

    /// Alt-screen handover: tear the PTY child down and relaunch the
    /// same command as a direct foreground process.
    fn handle_alt_screen(&mut self, id: u64) {
        let Some(idx) = self.block_index(id) else {
            return;
        };
        {
            let block = &mut self.blocks[idx];
            if !block.is_running() {
                return;
            }
            block.release_pty();
            if let Some(child) = block.child.take() {
                let _ = terminator::terminate(child);
            }
            block.uses_alt_screen = true;
            block.in_direct_mode = true;
            block.state = BlockState::DirectMode;
            block.output.clear();
            block.append_line("[Restarting in full-screen mode...]");
        }
        if self.focused == Some(id) {
            self.set_focus(None);
        }

        self.run_direct(id);
    }

    fn handle_finished(&mut self, id: u64) {
        let Some(idx) = self.block_index(id) else {
            return;
        };
        {
            let block = &mut self.blocks[idx];
            if !block.is_running() {
                return;
            }
            let exit_code = match block.child.as_mut() {
                Some(child) => match child.wait() {
                    Ok(status) => status.exit_code() as i32,
                    Err(_) => -1,
                },
                None => -1,
            };
            block.release_pty();
            block.child = None;

            let state = if exit_code == 0 {
                BlockState::Succeeded
            } else {
                BlockState::Failed
            };
            block.finish(state, exit_code);
        }
        if self.focused == Some(id) {
            self.set_focus(None);
        }
        self.refresh_prompt();
    }

    // ------------------------------------------------------------------
    // Mouse
    // ------------------------------------------------------------------

    pub fn handle_mouse(&mut self, event: MouseEvent) -> bool {
        match event.kind {
            MouseEventKind::ScrollUp => {
                self.user_scrolling = true;
                self.scroll_offset = self.scroll_offset.saturating_sub(3);
                true
            }
            MouseEventKind::ScrollDown => {
                self.user_scrolling = true;
                self.scroll_offset += 3;
                true
            }
            MouseEventKind::Down(MouseButton::Left) => self.handle_left_click(event),
            MouseEventKind::Down(_) => {
                self.user_scrolling = true;
                false
            }
            _ => false,
        }
    }

    fn handle_left_click(&mut self, event: MouseEvent) -> bool {
        let area = self.viewport_area;
        if event.row < area.y || event.row >= area.y + area.height {
            return false;
        }
        let content_row = self.scroll_offset + (event.row - area.y) as usize;

        let hit = self.hotspots.iter().find(|h| {
            h.row == content_row && event.column >= h.col_start && event.column < h.col_end
        });
        let Some(hit) = hit.cloned() else {
            return false;
        };

        match hit.kind {
            HotspotKind::Copy => self.copy_block(hit.id),
            HotspotKind::Cancel => self.cancel_block(hit.id),
        }
        true
    }

    /// Copy `$ command` plus the compiled output to the clipboard.
    fn copy_block(&mut self, id: u64) {
        let Some(idx) = self.block_index(id) else {
            return;
        };
        let content_width = self.width.saturating_sub(2).max(8) as usize;
        let payload = {
            let block = &self.blocks[idx];
            format!(
                "$ {}\n{}",
                block.command,
                crate::primitives::ansi_replay::compile(
                    &String::from_utf8_lossy(&block.output),
                    content_width,
                )
            )
        };

        let result = self.clipboard.copy(payload);
        let block = &mut self.blocks[idx];
        match result {
            Ok(()) => {
                block.copy_status = CopyStatus::Success;
                block.copy_error = None;
            }
            Err(e) => {
                block.copy_status = CopyStatus::Failure;
                block.copy_error = Some(e);
            }
        }
    }

    fn cancel_block(&mut self, id: u64) {
        let Some(idx) = self.block_index(id) else {
            return;
        };
        {
            let block = &mut self.blocks[idx];
            if !block.is_running() {
                return;
            }
            block.release_pty();
            if let Some(child) = block.child.take() {
                let _ = terminator::terminate(child);
            }
            block.finish(BlockState::Cancelled, 130);
            block.copy_status = CopyStatus::None;
        }
        if self.focused == Some(id) {
            self.set_focus(None);
        }
    }

    // ------------------------------------------------------------------
    // Resize / ticks / rendering
    // ------------------------------------------------------------------

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let size = self.pty_size();
        for block in &self.blocks {
            if let Some(master) = &block.master {
                if let Err(e) = master.resize(size) {
                    tracing::warn!("failed to resize pty for block {}: {}", block.id, e);
                }
            }
        }
    }

    /// Advance the spinner; returns true when a redraw is needed.
    pub fn tick(&mut self) -> bool {
        if self.blocks.iter().any(|b| b.is_active()) {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
            true
        } else {
            false
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let viewport_area = Rect::new(
            area.x,
            area.y,
            area.width,
            area.height.saturating_sub(INPUT_AREA_HEIGHT),
        );
        let input_area = Rect::new(
            area.x,
            area.y + viewport_area.height,
            area.width,
            area.height - viewport_area.height,
        );
        self.viewport_area = viewport_area;

        let composed = block_view::compose(
            self.banner.as_deref(),
            &self.blocks,
            &self.palette,
            area.width,
            self.spinner_frame,
        );
        self.hotspots = composed.hotspots;

        let visible = viewport_area.height as usize;
        let max_offset = composed.lines.len().saturating_sub(visible);
        if self.user_scrolling {
            self.scroll_offset = self.scroll_offset.min(max_offset);
        } else {
            self.scroll_offset = max_offset;
        }

        let end = (self.scroll_offset + visible).min(composed.lines.len());
        let window: Vec<Line<'static>> = composed.lines[self.scroll_offset..end].to_vec();
        frame.render_widget(Paragraph::new(Text::from(window)), viewport_area);

        if input_area.height >= 2 {
            let prompt_area = Rect::new(input_area.x, input_area.y, input_area.width, 1);
            let editor_area = Rect::new(input_area.x, input_area.y + 1, input_area.width, 1);
            frame.render_widget(
                Paragraph::new(Line::raw(self.prompt_cache.clone())),
                prompt_area,
            );
            let input_focused = self.focused.is_none() && !self.completion.active;
            frame.render_widget(
                Paragraph::new(self.input.render(&self.palette, input_focused)),
                editor_area,
            );
        }

        if self.completion.active {
            crate::view::overlay::render(frame, area, &self.completion, &self.palette);
        }
    }

    /// OSC sequences to write straight to the host terminal this frame:
    /// title and cwd report on change, the prompt-end marker whenever the
    /// view settles with no block running.
    pub fn osc_frame_output(&mut self) -> String {
        let mut out = String::new();
        let cwd = self.current_cwd();

        let title = osc::session_title(&prompt::boring(&cwd));
        if title != self.last_title {
            out.push_str(&title);
            self.last_title = title;
        }

        let report = osc::cwd_report(&cwd);
        if report != self.last_cwd_report {
            out.push_str(&report);
            self.last_cwd_report = report;
        }

        if self.blocks.iter().any(|b| b.is_active()) {
            self.prompt_end_pending = true;
        } else if self.prompt_end_pending {
            out.push_str(osc::PROMPT_END);
            self.prompt_end_pending = false;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_io::DirectoryContext;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn test_app() -> (TempDir, App, std::sync::mpsc::Receiver<EngineEvent>) {
        let tmp = TempDir::new().unwrap();
        let dirs = DirectoryContext::rooted_at(tmp.path());
        let mut config = Config::default();
        // Keep submissions from touching a real IPC endpoint.
        config.shell.executable = "/bin/sh".into();
        config.shell.args = Vec::new();

        let history = History::new(dirs.history_file(), 100);
        let (tx, rx) = mpsc::channel();
        let cwd = Arc::new(Mutex::new(std::env::temp_dir()));
        let app = App::new(
            config,
            history,
            Clipboard::internal_only(),
            IpcEndpoint {
                addr: "http://127.0.0.1:1".into(),
                key: "test".into(),
            },
            cwd,
            tx,
            80,
            24,
        );
        (tmp, app, rx)
    }

    fn finished_block(id: u64) -> CommandBlock {
        let mut block = CommandBlock::new(id, "true".into(), "~".into());
        block.finish(BlockState::Succeeded, 0);
        block
    }

    fn running_block(id: u64) -> CommandBlock {
        CommandBlock::new(id, "sleep 1".into(), "~".into())
    }

    #[test]
    fn at_most_one_block_focused() {
        let (_tmp, mut app, _rx) = test_app();
        app.blocks.push(running_block(1));
        app.blocks.push(running_block(2));

        app.set_focus(Some(1));
        app.set_focus(Some(2));

        let focused: Vec<u64> = app
            .blocks
            .iter()
            .filter(|b| b.focused)
            .map(|b| b.id)
            .collect();
        assert_eq!(focused, vec![2]);
    }

    #[test]
    fn cycle_focus_skips_finished_blocks() {
        let (_tmp, mut app, _rx) = test_app();
        app.blocks.push(finished_block(1));
        app.blocks.push(running_block(2));
        app.blocks.push(running_block(3));

        app.cycle_focus(false);
        assert_eq!(app.focused, Some(2));
        app.cycle_focus(false);
        assert_eq!(app.focused, Some(3));
        app.cycle_focus(false);
        assert_eq!(app.focused, Some(2));
    }

    #[test]
    fn cycle_focus_up_prefers_most_recent() {
        let (_tmp, mut app, _rx) = test_app();
        app.blocks.push(running_block(1));
        app.blocks.push(running_block(2));

        app.cycle_focus(true);
        assert_eq!(app.focused, Some(2));
        app.cycle_focus(true);
        assert_eq!(app.focused, Some(1));
    }

    #[test]
    fn esc_clears_focus() {
        let (_tmp, mut app, _rx) = test_app();
        app.blocks.push(running_block(1));
        app.set_focus(Some(1));

        app.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert_eq!(app.focused, None);
        assert!(!app.blocks[0].focused);
    }

    #[test]
    fn finished_event_clears_focus_and_resolves_state() {
        let (_tmp, mut app, _rx) = test_app();
        app.blocks.push(running_block(7));
        app.set_focus(Some(7));

        app.handle_engine_event(EngineEvent::Finished { id: 7 });

        assert_eq!(app.focused, None);
        // No child handle: exit code falls back to -1 → failed.
        assert_eq!(app.blocks[0].state, BlockState::Failed);
        assert_eq!(app.blocks[0].exit_code, -1);
        assert!(app.blocks[0].end_time.is_some());
    }

    #[test]
    fn chunk_appends_to_running_blocks_only() {
        let (_tmp, mut app, _rx) = test_app();
        app.blocks.push(running_block(1));
        app.handle_engine_event(EngineEvent::Chunk {
            id: 1,
            bytes: b"out".to_vec(),
        });
        assert_eq!(app.blocks[0].output, b"out");

        app.blocks[0].finish(BlockState::Cancelled, 130);
        app.handle_engine_event(EngineEvent::Chunk {
            id: 1,
            bytes: b"late".to_vec(),
        });
        assert_eq!(app.blocks[0].output, b"out");
    }

    #[test]
    fn user_scrolling_resets_on_non_navigation_key() {
        let (_tmp, mut app, _rx) = test_app();
        app.handle_key(KeyEvent::new(KeyCode::PageUp, KeyModifiers::NONE));
        assert!(app.user_scrolling);

        app.handle_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE));
        assert!(!app.user_scrolling);
    }

    #[test]
    fn submit_clear_resets_ids_and_list() {
        let (_tmp, mut app, _rx) = test_app();
        app.blocks.push(finished_block(1));
        app.blocks.push(finished_block(2));
        app.next_id = 3;

        app.submit("clear");
        assert!(app.blocks.is_empty());
        assert_eq!(app.next_id, 1);
    }

    #[test]
    fn block_ids_are_dense_and_increasing() {
        let (_tmp, mut app, _rx) = test_app();
        app.submit("printf one");
        app.submit("printf two");

        let ids: Vec<u64> = app.blocks.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(app.next_id, 3);

        app.shutdown_children();
    }

    #[test]
    fn alias_rewrites_first_word_only() {
        let (_tmp, mut app, _rx) = test_app();
        app.config
            .shell
            .alias
            .insert("ll".into(), "ls -la".into());

        app.submit("ll /tmp");
        assert_eq!(app.blocks[0].command, "ls -la /tmp");

        app.shutdown_children();
    }

    #[test]
    fn ipc_exit_event_requests_shutdown() {
        let (_tmp, mut app, _rx) = test_app();
        app.handle_engine_event(EngineEvent::IpcExit { code: 7 });
        assert!(app.should_quit());
        assert_eq!(app.exit_code(), 7);
    }

    #[test]
    fn banner_event_is_stored() {
        let (_tmp, mut app, _rx) = test_app();
        app.handle_engine_event(EngineEvent::BannerReady {
            text: "user@host".into(),
        });
        assert_eq!(app.banner.as_deref(), Some("user@host"));
    }

    #[test]
    fn completion_overlay_enter_inserts_candidate() {
        let (_tmp, mut app, _rx) = test_app();
        app.completion.open(
            vec![crate::services::completion::Completion {
                value: "eckout".into(),
                display: "checkout".into(),
            }],
            None,
        );

        app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert!(!app.completion.active);
        assert_eq!(app.input.value(), "eckout");
    }

    #[test]
    fn completion_overlay_consumes_other_keys() {
        let (_tmp, mut app, _rx) = test_app();
        app.completion.open(Vec::new(), Some("no shell".into()));

        app.handle_key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        assert!(app.completion.active);
        assert_eq!(app.input.value(), "");

        app.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert!(!app.completion.active);
    }
}
