//! Tracing subscriber setup.
//!
//! The TUI owns stdout, so diagnostics go to a per-process log file.
//! `RUST_LOG` filters as usual; the default level is INFO.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber with file logging. Returns false if
/// the log file could not be created; the app runs without diagnostics
/// in that case.
pub fn init_global(log_file_path: &Path) -> bool {
    let Ok(log_file) = File::create(log_file_path) else {
        return false;
    };

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let fmt_layer = fmt::layer().with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_fails_gracefully_on_unwritable_path() {
        let tmp = TempDir::new().unwrap();
        let bad_path = tmp.path().join("no-such-dir").join("log.txt");
        assert!(!init_global(&bad_path));
    }
}
