//! PTY lifecycle: spawning children under a pseudo-terminal and
//! streaming their output back to the UI loop.
//!
//! Each running block has exactly one reader thread with at most one
//! read in flight. After delivering a chunk the reader parks on an ack
//! channel until the UI has applied the chunk, so a slow render
//! naturally back-pressures into the PTY buffer.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::thread;

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyModifiers};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::model::event::EngineEvent;
use crate::services::shell::ShellInvocation;

const READ_CHUNK: usize = 4096;

/// Everything the engine keeps for a freshly spawned PTY child.
pub struct SpawnedPty {
    pub child: Box<dyn Child + Send + Sync>,
    pub master: Box<dyn MasterPty + Send>,
    pub writer: Box<dyn Write + Send>,
    pub reader_ack: Sender<()>,
}

pub fn size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Spawn `invocation` under a new PTY and arm its reader.
pub fn spawn(
    invocation: &ShellInvocation,
    env_overlay: &[(String, String)],
    cwd: &Path,
    pty_size: PtySize,
    id: u64,
    events: Sender<EngineEvent>,
) -> Result<SpawnedPty> {
    let pair = native_pty_system()
        .openpty(pty_size)
        .context("opening pty")?;

    let mut cmd = CommandBuilder::new(&invocation.program);
    cmd.args(&invocation.args);
    cmd.cwd(cwd);
    for (key, value) in env_overlay {
        cmd.env(key, value);
    }

    let child = pair
        .slave
        .spawn_command(cmd)
        .with_context(|| format!("spawning {}", invocation.program))?;
    drop(pair.slave);

    let reader = pair
        .master
        .try_clone_reader()
        .context("cloning pty reader")?;
    let writer = pair.master.take_writer().context("taking pty writer")?;

    let (ack_tx, ack_rx) = mpsc::channel::<()>();
    spawn_reader(id, reader, events, ack_rx);

    tracing::debug!("spawned block {} child pid {:?}", id, child.process_id());

    Ok(SpawnedPty {
        child,
        master: pair.master,
        writer,
        reader_ack: ack_tx,
    })
}

fn spawn_reader(
    id: u64,
    mut reader: Box<dyn Read + Send>,
    events: Sender<EngineEvent>,
    ack_rx: mpsc::Receiver<()>,
) {
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    let _ = events.send(EngineEvent::Finished { id });
                    break;
                }
                Ok(n) => {
                    let bytes = buf[..n].to_vec();
                    if detect_alt_screen(&bytes) {
                        let _ = events.send(EngineEvent::AltScreenDetected { id });
                        break;
                    }
                    if events.send(EngineEvent::Chunk { id, bytes }).is_err() {
                        break;
                    }
                    // Wait for the engine to apply the chunk before the
                    // next read. A dropped ack sender means the block is
                    // gone.
                    if ack_rx.recv().is_err() {
                        break;
                    }
                }
                Err(e) => {
                    // EIO is how Linux reports the slave side closing.
                    #[cfg(unix)]
                    let end_of_stream = e.raw_os_error() == Some(libc::EIO);
                    #[cfg(not(unix))]
                    let end_of_stream = false;

                    if !end_of_stream {
                        let _ = events.send(EngineEvent::Chunk {
                            id,
                            bytes: format!("Error reading: {}\n", e).into_bytes(),
                        });
                    }
                    let _ = events.send(EngineEvent::Finished { id });
                    break;
                }
            }
        }
    });
}

/// Alt-screen sequences that trigger the direct-mode handover:
/// `?1049h` (modern), `?47h` (older), and the clear+home pair TUI apps
/// commonly open with.
const ALT_SCREEN_SEQUENCES: [&[u8]; 3] = [b"\x1b[?1049h", b"\x1b[?47h", b"\x1b[2J\x1b[H"];

pub fn detect_alt_screen(bytes: &[u8]) -> bool {
    ALT_SCREEN_SEQUENCES
        .iter()
        .any(|seq| contains_subsequence(bytes, seq))
}

fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

/// Encode a key event as the bytes a focused block's PTY receives.
///
/// Enter becomes `\n` and Backspace the destructive `\b \b`, matching
/// what the block view expects to replay; control and alt combinations
/// map to their conventional control characters and escape prefixes.
pub fn key_to_pty_bytes(code: KeyCode, modifiers: KeyModifiers) -> Option<Vec<u8>> {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    let alt = modifiers.contains(KeyModifiers::ALT);

    if ctrl && !alt {
        if let KeyCode::Char(c) = code {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() {
                // Ctrl+A = 0x01 .. Ctrl+Z = 0x1a
                return Some(vec![(c as u8) - b'a' + 1]);
            }
        }
    }

    if alt && !ctrl {
        if let KeyCode::Char(c) = code {
            let mut bytes = vec![0x1b];
            let mut utf8 = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            return Some(bytes);
        }
    }

    match code {
        KeyCode::Char(c) => {
            let mut utf8 = [0u8; 4];
            Some(c.encode_utf8(&mut utf8).as_bytes().to_vec())
        }
        KeyCode::Enter => Some(b"\n".to_vec()),
        KeyCode::Backspace => Some(b"\x08 \x08".to_vec()),
        KeyCode::Tab => Some(b"\t".to_vec()),
        KeyCode::Esc => Some(vec![0x1b]),
        KeyCode::Up => Some(b"\x1b[A".to_vec()),
        KeyCode::Down => Some(b"\x1b[B".to_vec()),
        KeyCode::Right => Some(b"\x1b[C".to_vec()),
        KeyCode::Left => Some(b"\x1b[D".to_vec()),
        KeyCode::Home => Some(b"\x1b[H".to_vec()),
        KeyCode::End => Some(b"\x1b[F".to_vec()),
        KeyCode::PageUp => Some(b"\x1b[5~".to_vec()),
        KeyCode::PageDown => Some(b"\x1b[6~".to_vec()),
        KeyCode::Delete => Some(b"\x1b[3~".to_vec()),
        _ => None,
    }
}
