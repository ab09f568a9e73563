//! Messages delivered to the UI loop from background workers.
//!
//! PTY readers, the IPC server, and the banner resolver never touch
//! engine state directly; they send one of these and the single-threaded
//! dispatcher applies the transition.

use std::path::PathBuf;

#[derive(Debug)]
pub enum EngineEvent {
    /// A non-empty read from a block's PTY master.
    Chunk { id: u64, bytes: Vec<u8> },
    /// The block's output contained an enter-alt-screen sequence.
    AltScreenDetected { id: u64 },
    /// EOF (or a fatal read error already reported as a chunk).
    Finished { id: u64 },
    /// A child asked the parent to exit with the given code.
    IpcExit { code: i32 },
    /// A child reported its working directory; the chdir already
    /// happened inside the IPC handler.
    IpcCwd { path: PathBuf },
    /// The system-info banner finished resolving.
    BannerReady { text: String },
}
