pub mod ansi;
pub mod ansi_replay;
