//! Tab-completion bridge.
//!
//! Completions come from the configured shell itself: a one-shot
//! subprocess runs a script that prints candidates, one per line (JSON
//! for PowerShell). The shell dialect is inferred from the completion
//! executable's basename.

use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, bail, Result};

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Suffix inserted at the cursor.
    pub value: String,
    /// What the overlay shows.
    pub display: String,
}

const HARD_CAP: usize = 50;

fn max_results() -> usize {
    let from_lines = std::env::var("LINES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .map(|lines| lines.saturating_sub(4));
    match from_lines {
        Some(n) => n.min(HARD_CAP),
        None => 20,
    }
}

/// Get completions for `line` with the cursor at char position `cursor`.
pub fn get_completions(shell: &str, line: &str, cursor: usize) -> Result<Vec<Completion>> {
    let basename = Path::new(shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(shell)
        .to_ascii_lowercase();

    match basename.as_str() {
        "bash" => bash_completions(line, cursor),
        "zsh" => zsh_completions(line, cursor),
        "powershell" | "pwsh" | "powershell.exe" | "pwsh.exe" => {
            powershell_completions(shell, line, cursor)
        }
        other => bail!("unsupported completion shell: '{}'", other),
    }
}

/// The word being completed: the last whitespace-delimited field before
/// the cursor, empty when the cursor follows a space.
fn current_word(line: &str, cursor: usize) -> (String, String) {
    let before_cursor: String = line.chars().take(cursor).collect();
    let word = if before_cursor.ends_with(' ') {
        String::new()
    } else {
        before_cursor
            .split_whitespace()
            .last()
            .unwrap_or("")
            .to_string()
    };
    (before_cursor, word)
}

fn quote_for_double_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}

const BASH_SCRIPT: &str = r#"
set -e
export COMP_LINE="__LINE__"
export COMP_POINT=__POINT__
export COMP_WORDS=(__WORDS__)
export COMP_CWORD=__CWORD__

if [ -n "__WORD__" ]; then
    compgen -f -c -d -- "__WORD__" 2>/dev/null || true
else
    compgen -c 2>/dev/null || true
fi
"#;

fn bash_completions(line: &str, cursor: usize) -> Result<Vec<Completion>> {
    let cursor = cursor.min(line.chars().count());
    let (before_cursor, word) = current_word(line, cursor);

    let words: Vec<&str> = before_cursor.split_whitespace().collect();
    let quoted_words: Vec<String> = words
        .iter()
        .map(|w| format!("\"{}\"", quote_for_double_quotes(w)))
        .collect();

    let script = BASH_SCRIPT
        .replace("__LINE__", &quote_for_double_quotes(line))
        .replace("__POINT__", &cursor.to_string())
        .replace("__WORDS__", &quoted_words.join(" "))
        .replace("__CWORD__", &words.len().saturating_sub(1).to_string())
        .replace("__WORD__", &word);

    let output = Command::new("bash")
        .args(["-l", "-c", script.as_str()])
        .output()
        .map_err(|e| anyhow!("bash completion failed: {}", e))?;
    if !output.status.success() {
        bail!(
            "bash completion failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(parse_line_output(
        &String::from_utf8_lossy(&output.stdout),
        &word,
    ))
}

const ZSH_SCRIPT: &str = r#"
autoload -U compinit
compinit -u 2>/dev/null

get_completions() {
    local word="$1"

    if [[ -z "$word" ]]; then
        print -l ${(k)commands}
        print -l ${(k)aliases}
        print -l ${(k)functions}
        print -l ${(k)builtins}
    else
        setopt NULL_GLOB
        local matches=()

        matches+=(${word}*(.N))
        matches+=(${word}*(/N))

        if [[ ${#matches} -eq 0 ]]; then
            matches+=(*${word}*(.N))
            matches+=(*${word}*(/N))
        fi

        if [[ "$word" =~ '^[a-zA-Z]' ]]; then
            matches+=(${(M)${(k)commands}:#${word}*})
            matches+=(${(M)${(k)aliases}:#${word}*})
            matches+=(${(M)${(k)functions}:#${word}*})
            matches+=(${(M)${(k)builtins}:#${word}*})
        fi

        print -l ${(u)matches}
    fi
}

get_completions "__WORD__" | head -n 50
"#;

fn zsh_completions(line: &str, cursor: usize) -> Result<Vec<Completion>> {
    let cursor = cursor.min(line.chars().count());
    let (_, word) = current_word(line, cursor);

    let script = ZSH_SCRIPT.replace("__WORD__", &quote_for_double_quotes(&word));

    let output = Command::new("zsh")
        .args(["-l", "-c", script.as_str()])
        .output()
        .map_err(|e| anyhow!("zsh completion failed: {}", e))?;
    if !output.status.success() {
        bail!(
            "zsh completion failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(parse_line_output(
        &String::from_utf8_lossy(&output.stdout),
        &word,
    ))
}

const POWERSHELL_SCRIPT: &str = r#"
$inputScript = @'
__SCRIPT__
'@

$cursorPosition = __POINT__

try {
    $completions = TabExpansion2 -inputScript $inputScript -cursorColumn $cursorPosition

    $results = @()
    if ($completions -and $completions.CompletionMatches) {
        foreach ($completion in $completions.CompletionMatches) {
            $result = @{
                Value = $completion.CompletionText
                Display = if ($completion.ListItemText) {
                    $completion.ListItemText
                } else {
                    $completion.CompletionText
                }
            }
            $results += $result
        }
    }

    $results | ConvertTo-Json -Depth 2
} catch {
    @() | ConvertTo-Json
}
"#;

fn powershell_completions(shell: &str, line: &str, cursor: usize) -> Result<Vec<Completion>> {
    let cursor = cursor.min(line.chars().count());

    let script = POWERSHELL_SCRIPT
        .replace("__SCRIPT__", &line.replace('\'', "''"))
        .replace("__POINT__", &cursor.to_string());

    let output = Command::new(shell)
        .args(["-NoProfile", "-Command", script.as_str()])
        .output()
        .map_err(|e| anyhow!("powershell completion failed: {}", e))?;
    if !output.status.success() {
        bail!(
            "powershell completion failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    parse_powershell_output(&String::from_utf8_lossy(&output.stdout))
}

fn parse_line_output(output: &str, current_word: &str) -> Vec<Completion> {
    let max = max_results();
    let mut completions = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        completions.push(Completion {
            value: line
                .strip_prefix(current_word)
                .unwrap_or(line)
                .to_string(),
            display: line.to_string(),
        });

        if completions.len() >= max {
            break;
        }
    }

    completions
}

fn parse_powershell_output(output: &str) -> Result<Vec<Completion>> {
    let output = output.trim();
    if output.is_empty() || output == "[]" {
        return Ok(Vec::new());
    }

    let parsed: serde_json::Value = serde_json::from_str(output)
        .map_err(|e| anyhow!("failed to parse PowerShell output: {}", e))?;
    let items: Vec<&serde_json::Value> = match &parsed {
        serde_json::Value::Array(items) => items.iter().collect(),
        single @ serde_json::Value::Object(_) => vec![single],
        _ => bail!("unexpected PowerShell completion payload"),
    };

    let max = max_results();
    let mut completions = Vec::new();
    for item in items {
        let Some(value) = item.get("Value").and_then(|v| v.as_str()) else {
            continue;
        };
        let display = item
            .get("Display")
            .and_then(|v| v.as_str())
            .unwrap_or(value);

        completions.push(Completion {
            value: value.to_string(),
            display: display.to_string(),
        });

        if completions.len() >= max {
            break;
        }
    }

    Ok(completions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_word_mid_token() {
        let (_, word) = current_word("git che", 7);
        assert_eq!(word, "che");
    }

    #[test]
    fn current_word_after_space_is_empty() {
        let (_, word) = current_word("git ", 4);
        assert_eq!(word, "");
    }

    #[test]
    fn current_word_respects_cursor() {
        let (_, word) = current_word("git checkout", 7);
        assert_eq!(word, "che");
    }

    #[test]
    fn line_output_strips_current_word_prefix() {
        let completions = parse_line_output("checkout\ncherry-pick\n", "che");
        assert_eq!(completions[0].value, "ckout");
        assert_eq!(completions[0].display, "checkout");
        assert_eq!(completions[1].value, "rry-pick");
    }

    #[test]
    fn line_output_keeps_unprefixed_candidates_whole() {
        let completions = parse_line_output("README.md\n", "rea");
        assert_eq!(completions[0].value, "README.md");
    }

    #[test]
    fn powershell_array_and_single_object() {
        let array = r#"[{"Value": "Get-Item", "Display": "Get-Item"}]"#;
        let parsed = parse_powershell_output(array).unwrap();
        assert_eq!(parsed[0].value, "Get-Item");

        let single = r#"{"Value": "ls", "Display": "ls -> Get-ChildItem"}"#;
        let parsed = parse_powershell_output(single).unwrap();
        assert_eq!(parsed[0].display, "ls -> Get-ChildItem");
    }

    #[test]
    fn powershell_empty_payloads() {
        assert!(parse_powershell_output("").unwrap().is_empty());
        assert!(parse_powershell_output("[]").unwrap().is_empty());
    }

    #[test]
    fn unsupported_shell_is_an_error() {
        assert!(get_completions("/bin/fish", "ls", 2).is_err());
    }
}
