//! Classifier deciding whether a command runs as a block under a PTY or
//! takes over the real terminal in direct mode.
//!
//! Two layers: a list of programs that always want the full screen, and
//! per-subcommand rules for programs like git whose interactivity
//! depends on their options.

/// Programs that always run full-screen.
const FULL_SCREEN_APPS: [&str; 17] = [
    "nvim", "lazygit", "vim", "emacs", "nano", "less", "zsh", "bash", "sh", "dash", "fish",
    "elvish", "tmux", "htop", "btop", "pwsh", "ssh",
];

/// Option-dependent rule for one `<command> <subcommand>` pair.
struct SubcommandRule {
    subcommand: &'static str,
    /// Full-screen unless one of these appears.
    not_arg: &'static [&'static str],
    /// Full-screen unless a word starting with one of these appears.
    not_arg_starts_with: &'static [&'static str],
    /// Full-screen iff one of these appears.
    arg: &'static [&'static str],
    /// Full-screen iff a word starting with one of these appears.
    arg_starts_with: &'static [&'static str],
}

struct CommandRule {
    command: &'static str,
    subcommands: &'static [SubcommandRule],
}

const COMPLEX_RULES: [CommandRule; 1] = [CommandRule {
    command: "git",
    subcommands: &[
        SubcommandRule {
            subcommand: "commit",
            not_arg: &["-m", "-F", "-C", "--no-edit"],
            not_arg_starts_with: &[
                "--message=",
                "--file=",
                "--reuse-message=",
                "--fixup=",
                "--squash=",
            ],
            arg: &[],
            arg_starts_with: &[],
        },
        SubcommandRule {
            subcommand: "rebase",
            not_arg: &[],
            not_arg_starts_with: &[],
            arg: &["-i"],
            arg_starts_with: &["--interactive="],
        },
        SubcommandRule {
            subcommand: "config",
            not_arg: &[],
            not_arg_starts_with: &[],
            arg: &["--edit"],
            arg_starts_with: &[],
        },
    ],
}];

/// True when the first word names an always-full-screen program.
pub fn is_full_screen_app(first_word: &str) -> bool {
    FULL_SCREEN_APPS.contains(&first_word)
}

/// Evaluate the option-dependent rule table over the tokenised command.
pub fn matches_complex_rules(words: &[&str]) -> bool {
    if words.len() < 2 {
        return false;
    }

    for rule in &COMPLEX_RULES {
        if rule.command != words[0] {
            continue;
        }
        for sub in rule.subcommands {
            if sub.subcommand != words[1] {
                continue;
            }
            if evaluate_rule(sub, words) {
                return true;
            }
        }
    }

    false
}

fn evaluate_rule(rule: &SubcommandRule, words: &[&str]) -> bool {
    let options = &words[2..];
    let mut full_screen = false;

    if !rule.not_arg.is_empty() {
        full_screen = true;
        for veto in rule.not_arg {
            if options.iter().any(|word| word == veto) {
                return false;
            }
        }
    }
    if !rule.not_arg_starts_with.is_empty() {
        full_screen = true;
        for prefix in rule.not_arg_starts_with {
            if options.iter().any(|word| word.starts_with(prefix)) {
                return false;
            }
        }
    }
    if !rule.arg.is_empty() {
        for needle in rule.arg {
            if words.iter().any(|word| word == needle) {
                return true;
            }
        }
    }
    if !full_screen && !rule.arg_starts_with.is_empty() {
        for prefix in rule.arg_starts_with {
            if words.iter().any(|word| word.starts_with(prefix)) {
                return true;
            }
        }
    }

    full_screen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(command: &str) -> bool {
        let words: Vec<&str> = command.split_whitespace().collect();
        matches_complex_rules(&words)
    }

    #[test]
    fn bare_git_commit_is_full_screen() {
        assert!(classify("git commit"));
    }

    #[test]
    fn git_commit_with_message_is_a_block() {
        assert!(!classify("git commit -m \"x\""));
        assert!(!classify("git commit --no-edit"));
        assert!(!classify("git commit --message=done"));
        assert!(!classify("git commit -a --fixup=abc123"));
    }

    #[test]
    fn git_commit_with_other_flags_stays_full_screen() {
        assert!(classify("git commit -a"));
        assert!(classify("git commit --verbose"));
    }

    #[test]
    fn git_rebase_interactive_only() {
        assert!(classify("git rebase -i main"));
        assert!(classify("git rebase --interactive=always main"));
        assert!(!classify("git rebase main"));
    }

    #[test]
    fn git_config_edit_only() {
        assert!(classify("git config --edit"));
        assert!(!classify("git config user.name"));
    }

    #[test]
    fn unrelated_commands_never_match() {
        assert!(!classify("cargo build --release"));
        assert!(!classify("git status"));
        assert!(!classify("git"));
    }

    #[test]
    fn known_apps() {
        assert!(is_full_screen_app("nvim"));
        assert!(is_full_screen_app("htop"));
        assert!(is_full_screen_app("less"));
        assert!(is_full_screen_app("ssh"));
        assert!(!is_full_screen_app("ls"));
        assert!(!is_full_screen_app("cargo"));
    }
}
