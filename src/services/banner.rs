//! Startup banner: a short system summary resolved off the UI thread
//! and delivered as an engine event once ready.

use std::path::Path;
use std::sync::mpsc::Sender;
use std::thread;

use crate::config::Config;
use crate::model::event::EngineEvent;

/// Resolve the banner in the background; the UI renders it above the
/// block list when the event arrives.
pub fn spawn(events: Sender<EngineEvent>, config: &Config) {
    let shell = config.shell.executable.clone();
    thread::spawn(move || {
        let text = build(&shell);
        let _ = events.send(EngineEvent::BannerReady { text });
    });
}

fn build(shell: &str) -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string());
    let host = hostname();
    let shell_name = Path::new(shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(shell);
    let term = std::env::var("TERM").unwrap_or_else(|_| "unknown".to_string());

    format!(
        "{}@{}\nos: {} {}\nshell: {}\nterm: {}",
        user,
        host,
        std::env::consts::OS,
        std::env::consts::ARCH,
        shell_name,
        term
    )
}

#[cfg(unix)]
fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(not(unix))]
fn hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string())
}
