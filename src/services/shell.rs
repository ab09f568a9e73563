//! Shell invocation glue.
//!
//! Builds the argv for the configured shell and wraps the user command
//! with the IPC call-backs: `exit`/`close` shims that report the exit
//! request to the parent, and an epilogue that posts the child's final
//! working directory before exiting with the real status.

use std::path::{Path, PathBuf};

use crate::config::ShellConfig;
use crate::services::ipc::IpcEndpoint;

/// Fully built child argv: `program` plus everything after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellInvocation {
    pub program: String,
    pub args: Vec<String>,
}

/// HTTP client available on the child's PATH for the IPC call-backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpTool {
    Curl,
    Wget,
}

/// Build the full child argv for a user command.
pub fn build_invocation(
    shell: &ShellConfig,
    endpoint: &IpcEndpoint,
    command: &str,
) -> ShellInvocation {
    let payload = format!("{}{}", aliases(endpoint), wrap(endpoint, command));
    let mut args = shell.args.clone();
    args.push(command_marker().to_string());
    args.push(escape(&payload));

    ShellInvocation {
        program: shell.executable.clone(),
        args,
    }
}

#[cfg(not(windows))]
fn command_marker() -> &'static str {
    "-c"
}

#[cfg(windows)]
fn command_marker() -> &'static str {
    "-EncodedCommand"
}

#[cfg(not(windows))]
fn aliases(endpoint: &IpcEndpoint) -> String {
    let Some(tool) = detect_http_tool() else {
        return String::new();
    };
    aliases_with(tool, endpoint)
}

#[cfg(not(windows))]
fn aliases_with(tool: HttpTool, endpoint: &IpcEndpoint) -> String {
    let post_exit = post_line(tool, endpoint, "exit $1");
    let mut out = String::new();
    for name in ["exit", "close"] {
        out.push_str(&format!(
            "{}() {{ {} ; builtin exit $1 ; }} ; ",
            name, post_exit
        ));
    }
    out
}

#[cfg(not(windows))]
fn wrap(endpoint: &IpcEndpoint, command: &str) -> String {
    match detect_http_tool() {
        Some(tool) => wrap_with(tool, endpoint, command),
        // Without curl or wget the cwd report is lost for this
        // invocation; run the bare command.
        None => command.to_string(),
    }
}

#[cfg(not(windows))]
fn wrap_with(tool: HttpTool, endpoint: &IpcEndpoint, command: &str) -> String {
    format!(
        "{} ; blockshell_exit_code=$? ; {} ; builtin exit $blockshell_exit_code",
        command,
        post_line(tool, endpoint, "cd $(pwd)")
    )
}

/// One-liner that POSTs `body` to the IPC endpoint with the shared key.
#[cfg(not(windows))]
fn post_line(tool: HttpTool, endpoint: &IpcEndpoint, body: &str) -> String {
    match tool {
        HttpTool::Curl => format!(
            r#"curl -s -X POST -H "X-Key: {}" {}/ipc -d "{}""#,
            endpoint.key, endpoint.addr, body
        ),
        HttpTool::Wget => format!(
            r#"wget -q --method=POST --header="X-Key: {}" --post-data="{}" {}/ipc -O -"#,
            endpoint.key, body, endpoint.addr
        ),
    }
}

#[cfg(not(windows))]
fn detect_http_tool() -> Option<HttpTool> {
    if lookup_path("curl").is_some() {
        Some(HttpTool::Curl)
    } else if lookup_path("wget").is_some() {
        Some(HttpTool::Wget)
    } else {
        None
    }
}

/// Unix shells take the payload verbatim.
#[cfg(not(windows))]
fn escape(payload: &str) -> String {
    payload.to_string()
}

#[cfg(windows)]
fn aliases(endpoint: &IpcEndpoint) -> String {
    format!(
        r#"function close {{ Invoke-RestMethod -Uri "{}/ipc" -Method POST -Headers @{{"X-Key" = "{}"}} -Body "exit $($args[0])" }} ; "#,
        endpoint.addr, endpoint.key
    )
}

#[cfg(windows)]
fn wrap(endpoint: &IpcEndpoint, command: &str) -> String {
    format!(
        r#"try {{ {} }} finally {{ Invoke-RestMethod -Uri "{}/ipc" -Method POST -Headers @{{"X-Key" = "{}"}} -Body "cd $(pwd)" }}"#,
        command, endpoint.addr, endpoint.key
    )
}

/// PowerShell's `-EncodedCommand` takes base64 over UTF-16LE.
#[cfg(windows)]
fn escape(payload: &str) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let mut bytes = Vec::with_capacity(payload.len() * 2);
    for unit in payload.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Resolve a program name against PATH.
pub fn lookup_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    fn endpoint() -> IpcEndpoint {
        IpcEndpoint {
            addr: "http://127.0.0.1:4567".into(),
            key: "deadbeef".into(),
        }
    }

    #[test]
    fn invocation_appends_marker_and_payload() {
        let shell = ShellConfig {
            executable: "/bin/bash".into(),
            args: vec!["-l".into()],
            ..Default::default()
        };
        let inv = build_invocation(&shell, &endpoint(), "echo hi");

        assert_eq!(inv.program, "/bin/bash");
        assert_eq!(inv.args.len(), 3);
        assert_eq!(inv.args[0], "-l");
        assert_eq!(inv.args[1], "-c");
        assert!(inv.args[2].contains("echo hi"));
    }

    #[test]
    fn curl_wrap_reports_cwd_and_preserves_exit_code() {
        let wrapped = wrap_with(HttpTool::Curl, &endpoint(), "make test");
        assert!(wrapped.starts_with("make test ; blockshell_exit_code=$?"));
        assert!(wrapped.contains(r#"-H "X-Key: deadbeef""#));
        assert!(wrapped.contains("http://127.0.0.1:4567/ipc"));
        assert!(wrapped.contains(r#"-d "cd $(pwd)""#));
        assert!(wrapped.ends_with("builtin exit $blockshell_exit_code"));
    }

    #[test]
    fn wget_wrap_uses_post_data() {
        let wrapped = wrap_with(HttpTool::Wget, &endpoint(), "ls");
        assert!(wrapped.contains(r#"--header="X-Key: deadbeef""#));
        assert!(wrapped.contains(r#"--post-data="cd $(pwd)""#));
    }

    #[test]
    fn aliases_define_exit_and_close_shims() {
        let aliases = aliases_with(HttpTool::Curl, &endpoint());
        assert!(aliases.contains("exit() {"));
        assert!(aliases.contains("close() {"));
        assert!(aliases.contains(r#"-d "exit $1""#));
        // Both shims still invoke the real builtin afterwards.
        assert_eq!(aliases.matches("builtin exit $1").count(), 2);
    }

    #[test]
    fn lookup_path_finds_sh() {
        assert!(lookup_path("sh").is_some());
        assert!(lookup_path("definitely-not-a-real-binary-42").is_none());
    }
}
