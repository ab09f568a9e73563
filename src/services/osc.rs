//! OSC escape sequences the UI emits to the host terminal: session
//! title, working-directory report, and the prompt-end marker.

use std::path::Path;

/// OSC 133;A: end of prompt, emitted whenever no block is running.
pub const PROMPT_END: &str = "\x1b]133;A\x07";

/// OSC 2: set the session/window title.
pub fn session_title(title: &str) -> String {
    format!("\x1b]2;{}\x07", title)
}

/// OSC 7: report the current working directory as a file:// URL. The
/// path is normalised to forward slashes and URL-encoded as a whole, so
/// the separators themselves travel as `%2F`.
pub fn cwd_report(path: &Path) -> String {
    let normalised = path.display().to_string().replace('\\', "/");
    let encoded = urlencoding::encode(&normalised);
    format!("\x1b]7;file://{}/{}\x07", hostname(), encoded)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_osc2_with_bel() {
        assert_eq!(session_title("~/src"), "\x1b]2;~/src\x07");
    }

    #[test]
    fn cwd_report_is_a_file_url_with_the_whole_path_encoded() {
        let report = cwd_report(Path::new("/home/user/my project"));
        assert!(report.starts_with("\x1b]7;file://"));
        assert!(report.ends_with("\x07"));
        assert!(report.contains("/%2Fhome%2Fuser%2Fmy%20project"));
    }

    #[test]
    fn prompt_end_marker() {
        assert_eq!(PROMPT_END, "\x1b]133;A\x07");
    }
}
