//! Configuration: YAML schema, defaults, and the derived UI palette.
//!
//! The config file is created with defaults on first run and is frozen
//! for the lifetime of the process. Mode-indicator foreground colours
//! are derived from the configured backgrounds at load time.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

use crate::config_io::DirectoryContext;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Path to the child shell.
    pub executable: String,
    /// argv prefix placed before the `-c` / `-EncodedCommand` marker.
    #[serde(default)]
    pub args: Vec<String>,
    /// First-word substitution table applied on submission.
    #[serde(default)]
    pub alias: HashMap<String, String>,
    /// Extra environment variables, `${X}` expanded from the parent env.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Shell used for tab completion; defaults to `executable`.
    #[serde(default)]
    pub completion: String,
    /// History capacity; 0 disables history entirely.
    #[serde(default = "default_max_history")]
    pub max_history_length: u32,
}

fn default_max_history() -> u32 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    pub normal_mode_color: String,
    pub insert_mode_color: String,
    pub visual_mode_color: String,

    pub text_color: String,
    pub cursor_color: String,
    pub cursor_text_color: String,
    pub visual_selection_color: String,

    pub border_color: String,
    pub border_focus_color: String,
    pub header_color: String,
    pub header_command_running_color: String,
    pub header_command_done_color: String,
    pub header_command_failed_color: String,
    pub header_copy_color: String,

    pub running_color: String,
    pub completed_color: String,
    pub failed_color: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let executable = system_shell();
        let args = default_shell_args(&executable);
        ShellConfig {
            completion: executable.clone(),
            executable,
            args,
            alias: HashMap::new(),
            env: HashMap::new(),
            max_history_length: default_max_history(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            normal_mode_color: "4".into(),
            insert_mode_color: "2".into(),
            visual_mode_color: "5".into(),
            text_color: "7".into(),
            cursor_color: "7".into(),
            cursor_text_color: "0".into(),
            visual_selection_color: "8".into(),
            border_color: "8".into(),
            border_focus_color: "5".into(),
            header_color: "8".into(),
            header_command_running_color: "7".into(),
            header_command_done_color: "8".into(),
            header_command_failed_color: "1".into(),
            header_copy_color: "8".into(),
            running_color: "4".into(),
            completed_color: "2".into(),
            failed_color: "1".into(),
        }
    }
}

impl Config {
    /// Load the config file, creating it with defaults on first run.
    /// Any failure here is fatal at startup.
    pub fn load_or_create(dirs: &DirectoryContext) -> Result<Self> {
        let path = dirs.config_file();
        if !path.exists() {
            let config = Config::default();
            std::fs::create_dir_all(&dirs.config_dir).with_context(|| {
                format!("creating config directory {}", dirs.config_dir.display())
            })?;
            let yaml = serde_yaml::to_string(&config).context("serialising default config")?;
            std::fs::write(&path, yaml)
                .with_context(|| format!("writing default config to {}", path.display()))?;
            return Ok(config);
        }

        Self::load_from_file(&path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        if config.shell.completion.is_empty() {
            config.shell.completion = config.shell.executable.clone();
        }
        if config.shell.executable.is_empty() {
            config.shell.executable = system_shell();
        }
        Ok(config)
    }

    /// Build the environment overlay for children: the parent env plus
    /// `shell.env` with `${VAR}` references expanded.
    pub fn env_overlay(&self) -> Vec<(String, String)> {
        self.shell
            .env
            .iter()
            .map(|(k, v)| (k.clone(), expand_env(v)))
            .collect()
    }
}

/// Expand `$VAR` and `${VAR}` references from the parent environment.
/// Unknown variables expand to the empty string.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }
                out.push_str(&std::env::var(&name).unwrap_or_default());
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let mut name = String::new();
                while let Some(c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&std::env::var(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }

    out
}

fn system_shell() -> String {
    if let Ok(shell) = std::env::var("SHELL") {
        if !shell.is_empty() {
            return shell;
        }
    }
    #[cfg(unix)]
    {
        for candidate in ["/bin/bash", "/bin/sh"] {
            if Path::new(candidate).exists() {
                return candidate.to_string();
            }
        }
    }
    #[cfg(windows)]
    {
        if let Ok(comspec) = std::env::var("COMSPEC") {
            return comspec;
        }
    }
    "sh".to_string()
}

const LOGIN_SHELLS: [&str; 4] = ["bash", "zsh", "dash", "fish"];

fn default_shell_args(executable: &str) -> Vec<String> {
    let base = Path::new(executable)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(executable);
    if LOGIN_SHELLS.contains(&base) {
        vec!["-l".to_string()]
    } else {
        Vec::new()
    }
}

/// Resolved ratatui colours, including the derived mode-indicator
/// foregrounds.
#[derive(Debug, Clone)]
pub struct Palette {
    pub normal_bg: Color,
    pub normal_fg: Color,
    pub insert_bg: Color,
    pub insert_fg: Color,
    pub visual_bg: Color,
    pub visual_fg: Color,

    pub text: Color,
    pub cursor: Color,
    pub cursor_text: Color,
    pub visual_selection: Color,

    pub border: Color,
    pub border_focus: Color,
    pub header: Color,
    pub header_command_running: Color,
    pub header_command_done: Color,
    pub header_command_failed: Color,
    pub header_copy: Color,

    pub running: Color,
    pub completed: Color,
    pub failed: Color,
}

impl Palette {
    pub fn from_config(ui: &UiConfig) -> Self {
        let (normal_bg, normal_fg) = derive_mode_colors(&ui.normal_mode_color, "4");
        let (insert_bg, insert_fg) = derive_mode_colors(&ui.insert_mode_color, "2");
        let (visual_bg, visual_fg) = derive_mode_colors(&ui.visual_mode_color, "5");

        Palette {
            normal_bg,
            normal_fg,
            insert_bg,
            insert_fg,
            visual_bg,
            visual_fg,
            text: parse_color(&ui.text_color),
            cursor: parse_color(&ui.cursor_color),
            cursor_text: parse_color(&ui.cursor_text_color),
            visual_selection: parse_color(&ui.visual_selection_color),
            border: parse_color(&ui.border_color),
            border_focus: parse_color(&ui.border_focus_color),
            header: parse_color(&ui.header_color),
            header_command_running: parse_color(&ui.header_command_running_color),
            header_command_done: parse_color(&ui.header_command_done_color),
            header_command_failed: parse_color(&ui.header_command_failed_color),
            header_copy: parse_color(&ui.header_copy_color),
            running: parse_color(&ui.running_color),
            completed: parse_color(&ui.completed_color),
            failed: parse_color(&ui.failed_color),
        }
    }
}

/// A black badge background gets a light foreground; everything else a
/// dark one. Empty/"default" falls back to the shipped background.
fn derive_mode_colors(configured_bg: &str, fallback_bg: &str) -> (Color, Color) {
    let bg = match configured_bg {
        "" | "default" => fallback_bg,
        other => other,
    };
    let fg = if bg == "0" { "7" } else { "0" };
    (parse_color(bg), parse_color(fg))
}

/// Parse a palette slot: `#rrggbb` hex or an ANSI index.
pub fn parse_color(value: &str) -> Color {
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() == 6 {
            if let (Ok(r), Ok(g), Ok(b)) = (
                u8::from_str_radix(&hex[0..2], 16),
                u8::from_str_radix(&hex[2..4], 16),
                u8::from_str_radix(&hex[4..6], 16),
            ) {
                return Color::Rgb(r, g, b);
            }
        }
        return Color::Reset;
    }
    match value.parse::<u8>() {
        Ok(index) => Color::Indexed(index),
        Err(_) => Color::Reset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_run_creates_config_file_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let dirs = DirectoryContext::rooted_at(tmp.path());

        let config = Config::load_or_create(&dirs).unwrap();
        assert!(dirs.config_file().exists());
        assert_eq!(config.shell.max_history_length, 100);
        assert_eq!(config.shell.completion, config.shell.executable);

        // A second load parses the file we just wrote.
        let reloaded = Config::load_or_create(&dirs).unwrap();
        assert_eq!(reloaded.shell.executable, config.shell.executable);
    }

    #[test]
    fn completion_defaults_to_executable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(
            &path,
            "shell:\n  executable: /bin/zsh\n  max_history_length: 5\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.shell.completion, "/bin/zsh");
        assert_eq!(config.shell.max_history_length, 5);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "shell: [not, a, map]\n").unwrap();
        assert!(Config::load_from_file(&path).is_err());
    }

    #[test]
    fn derived_mode_foregrounds() {
        let mut ui = UiConfig::default();
        ui.normal_mode_color = "0".into();
        ui.insert_mode_color = String::new();
        let palette = Palette::from_config(&ui);
        // Black background gets the light foreground.
        assert_eq!(palette.normal_fg, Color::Indexed(7));
        // Empty falls back to the shipped background and dark foreground.
        assert_eq!(palette.insert_bg, Color::Indexed(2));
        assert_eq!(palette.insert_fg, Color::Indexed(0));
    }

    #[test]
    fn parse_color_variants() {
        assert_eq!(parse_color("4"), Color::Indexed(4));
        assert_eq!(parse_color("#ff8000"), Color::Rgb(255, 128, 0));
        assert_eq!(parse_color("bogus"), Color::Reset);
    }

    #[test]
    fn expand_env_both_forms() {
        std::env::set_var("BLOCKSHELL_TEST_VAR", "value");
        assert_eq!(expand_env("a=${BLOCKSHELL_TEST_VAR}"), "a=value");
        assert_eq!(expand_env("a=$BLOCKSHELL_TEST_VAR!"), "a=value!");
        assert_eq!(expand_env("plain $"), "plain $");
        assert_eq!(expand_env("${BLOCKSHELL_MISSING_VAR}x"), "x");
    }
}
