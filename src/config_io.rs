//! System directory detection.
//!
//! Holds the resolved config and data directories so the rest of the
//! code never calls `dirs::*` directly; tests construct a context
//! pointing at a temp dir instead.

use std::path::PathBuf;

use anyhow::{anyhow, Result};

const APP_DIR: &str = "blockshell";

#[derive(Debug, Clone)]
pub struct DirectoryContext {
    /// Directory holding `config.yaml`.
    pub config_dir: PathBuf,
    /// Directory holding `history.txt`.
    pub data_dir: PathBuf,
}

impl DirectoryContext {
    /// Resolve from the host system (XDG dirs on Linux, the platform
    /// equivalents elsewhere).
    pub fn from_system() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("could not determine the user config directory"))?
            .join(APP_DIR);
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("could not determine the user data directory"))?
            .join(APP_DIR);
        Ok(DirectoryContext {
            config_dir,
            data_dir,
        })
    }

    /// Context rooted at an arbitrary directory (used by tests).
    pub fn rooted_at(root: &std::path::Path) -> Self {
        DirectoryContext {
            config_dir: root.join("config").join(APP_DIR),
            data_dir: root.join("data").join(APP_DIR),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.yaml")
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join("history.txt")
    }
}

/// Default path for the diagnostic log. The TUI owns stdout, so tracing
/// writes to a per-process file in the temp dir.
pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join(format!("blockshell-{}.log", std::process::id()))
}
