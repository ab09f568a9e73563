//! Parent–child IPC endpoint.
//!
//! Children cannot mutate the parent's working directory or ask it to
//! exit through the PTY, so every spawned command gets a loopback HTTP
//! URL and a per-process secret injected into its wrapper. The endpoint
//! accepts one-line commands: `cd <path>` and `exit [code]`.
//!
//! The URL and secret travel only inside the wrapped command line; they
//! are never written to disk.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tiny_http::{Method, Response, Server};

use crate::model::event::EngineEvent;

/// How long shutdown waits for the serving thread to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// The address/secret pair children need to call back.
#[derive(Debug, Clone)]
pub struct IpcEndpoint {
    /// `http://127.0.0.1:<port>`
    pub addr: String,
    /// Shared secret carried in the `X-Key` header.
    pub key: String,
}

/// Running IPC server plus the state it shares with the engine.
pub struct IpcServer {
    pub endpoint: IpcEndpoint,
    server: Arc<Server>,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

/// The parent's recorded working directory, shared between the IPC
/// handler and the UI thread's prompt rendering.
pub type SharedCwd = Arc<Mutex<PathBuf>>;

#[derive(Debug, PartialEq, Eq)]
enum Verb {
    Exit(i32),
    Cd(String),
    Unknown,
}

fn interpret(line: &str) -> Verb {
    let line = line.trim();
    let (verb, arg) = match line.split_once(' ') {
        Some((v, a)) => (v.trim(), a.trim()),
        None => (line, ""),
    };

    match verb {
        "exit" => Verb::Exit(arg.parse().unwrap_or(0)),
        "cd" => Verb::Cd(arg.to_string()),
        _ => Verb::Unknown,
    }
}

impl IpcServer {
    /// Bind a loopback listener on an ephemeral port and start serving.
    pub fn spawn(events: Sender<EngineEvent>, cwd: SharedCwd) -> Result<IpcServer> {
        let server = Server::http("127.0.0.1:0")
            .map_err(|e| anyhow!("starting IPC server: {}", e))?;
        let port = server
            .server_addr()
            .to_ip()
            .context("IPC server bound to a non-IP address")?
            .port();

        let endpoint = IpcEndpoint {
            addr: format!("http://127.0.0.1:{}", port),
            key: generate_key(),
        };

        let server = Arc::new(server);
        let (done_tx, done_rx) = mpsc::channel();

        let thread = {
            let server = Arc::clone(&server);
            let key = endpoint.key.clone();
            thread::spawn(move || {
                serve(&server, &key, &events, &cwd);
                let _ = done_tx.send(());
            })
        };

        tracing::info!("IPC endpoint listening on {}", endpoint.addr);

        Ok(IpcServer {
            endpoint,
            server,
            done_rx,
            thread: Some(thread),
        })
    }

    /// Stop accepting requests and wait up to one second for the serving
    /// thread to drain.
    pub fn shutdown(&mut self) {
        self.server.unblock();
        match self.done_rx.recv_timeout(DRAIN_TIMEOUT) {
            Ok(()) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
            }
            Err(_) => {
                tracing::warn!("IPC server did not drain within the shutdown deadline");
            }
        }
    }
}

fn serve(server: &Server, key: &str, events: &Sender<EngineEvent>, cwd: &SharedCwd) {
    // Serializes handler execution so state changes are observable in
    // receive order.
    let handler_lock = Mutex::new(());

    for mut request in server.incoming_requests() {
        let _guard = handler_lock.lock();

        let authorised = request
            .headers()
            .iter()
            .any(|h| h.field.equiv("X-Key") && h.value.as_str() == key);
        if !authorised {
            let _ = request.respond(Response::from_string("").with_status_code(401));
            continue;
        }

        if request.url() != "/ipc" || *request.method() != Method::Post {
            let _ = request.respond(Response::from_string("").with_status_code(404));
            continue;
        }

        let mut body = String::new();
        if request.as_reader().read_to_string(&mut body).is_err() {
            let _ = request.respond(Response::from_string("").with_status_code(400));
            continue;
        }

        let response = match interpret(&body) {
            Verb::Exit(code) => {
                tracing::info!("IPC exit requested with code {}", code);
                let _ = events.send(EngineEvent::IpcExit { code });
                Response::from_string("").with_status_code(200)
            }
            Verb::Cd(path) => match std::env::set_current_dir(&path) {
                Ok(()) => {
                    let path = PathBuf::from(path);
                    if let Ok(mut recorded) = cwd.lock() {
                        *recorded = path.clone();
                    }
                    let _ = events.send(EngineEvent::IpcCwd { path });
                    Response::from_string("").with_status_code(200)
                }
                Err(e) => Response::from_string(e.to_string()).with_status_code(400),
            },
            Verb::Unknown => Response::from_string("Unknown command").with_status_code(404),
        };

        let _ = request.respond(response);
    }
}

/// Random printable token of 128 bits, built from two independently
/// seeded hasher draws plus time and pid entropy.
fn generate_key() -> String {
    let mut key = String::with_capacity(32);
    for salt in 0..2u32 {
        let state = RandomState::new();
        let mut hasher = state.build_hasher();
        hasher.write_u128(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
        );
        hasher.write_u32(std::process::id());
        hasher.write_u32(salt);
        key.push_str(&format!("{:016x}", hasher.finish()));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpret_exit_with_and_without_code() {
        assert_eq!(interpret("exit 7"), Verb::Exit(7));
        assert_eq!(interpret("exit"), Verb::Exit(0));
        assert_eq!(interpret("exit banana"), Verb::Exit(0));
        assert_eq!(interpret("  exit 130  "), Verb::Exit(130));
    }

    #[test]
    fn interpret_cd() {
        assert_eq!(interpret("cd /tmp"), Verb::Cd("/tmp".into()));
        assert_eq!(interpret("cd /with space/dir"), Verb::Cd("/with space/dir".into()));
    }

    #[test]
    fn interpret_garbage_is_unknown() {
        assert_eq!(interpret(""), Verb::Unknown);
        assert_eq!(interpret("rm -rf /"), Verb::Unknown);
    }

    #[test]
    fn keys_are_long_and_unique() {
        let a = generate_key();
        let b = generate_key();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
