//! Prompt string: the working directory with the home prefix contracted
//! to `~`, decorated with the git branch and dirty markers.

use std::path::Path;
use std::process::Command;

/// Full prompt for the given directory, including git decoration.
pub fn get(cwd: &Path) -> String {
    format!("{}{}", boring(cwd), git_decoration(cwd))
}

/// Prompt without the git decoration (used for the session title).
pub fn boring(cwd: &Path) -> String {
    let display = cwd.display().to_string();
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => display.replacen(&home, "~", 1),
        _ => display,
    }
}

fn git_output(cwd: &Path, args: &[&str]) -> Result<std::process::Output, std::io::Error> {
    Command::new("git").args(args).current_dir(cwd).output()
}

/// `  branch [$!+?]` or empty outside a repository; `" ?"` when git
/// itself misbehaved.
fn git_decoration(cwd: &Path) -> String {
    let branch = match git_output(cwd, &["rev-parse", "--abbrev-ref", "HEAD"]) {
        Ok(out) if out.status.success() => {
            String::from_utf8_lossy(&out.stdout).trim().to_string()
        }
        // Exit code 128: not a repository.
        Ok(out) if out.status.code() == Some(128) => return String::new(),
        _ => return " ?".to_string(),
    };

    let mut decoration = format!("  {}", branch);

    let status = match git_output(cwd, &["status", "--porcelain"]) {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
        _ => return decoration,
    };
    if status.trim().is_empty() {
        return decoration;
    }

    let stashed = matches!(
        git_output(cwd, &["stash", "list"]),
        Ok(out) if out.status.success() && out.stdout.len() > 1
    );

    let mut modified = false;
    let mut untracked = false;
    let mut staged = false;
    for line in status.lines() {
        if line.starts_with(" M ") {
            modified = true;
        }
        if line.starts_with("?? ") {
            untracked = true;
        }
        if line.starts_with("A ") {
            staged = true;
        }
    }

    if modified || untracked || staged || stashed {
        decoration.push_str(" [");
        if stashed {
            decoration.push('$');
        }
        if modified {
            decoration.push('!');
        }
        if staged {
            decoration.push('+');
        } else if untracked {
            decoration.push('?');
        }
        decoration.push(']');
    }

    decoration
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn boring_contracts_home() {
        if let Ok(home) = std::env::var("HOME") {
            if !home.is_empty() {
                let inside = Path::new(&home).join("projects");
                assert_eq!(boring(&inside), "~/projects");
            }
        }
        assert_eq!(boring(Path::new("/usr/local")), "/usr/local");
    }

    #[test]
    fn no_decoration_outside_a_repository() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(git_decoration(tmp.path()), "");
    }
}
