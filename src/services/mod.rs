pub mod banner;
pub mod clipboard;
pub mod completion;
pub mod history;
pub mod ipc;
pub mod osc;
pub mod prompt;
pub mod pty;
pub mod shell;
pub mod signal_handler;
pub mod terminal_modes;
pub mod terminator;
pub mod tracing_setup;
