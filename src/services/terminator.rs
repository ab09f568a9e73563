//! Bounded-time child shutdown.
//!
//! `terminate` must return within the graceful window no matter what the
//! child does: signal, wait concurrently, escalate to a force-kill at the
//! deadline, and give up with an error only once the drain windows are
//! spent. The wait itself runs on an auxiliary thread so a wedged child
//! can never block the UI loop past the deadline.

use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use portable_pty::{Child, ExitStatus};

/// Window for the graceful-terminate signal to take effect.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(2);
/// Extra drain after the force-kill.
const KILL_DRAIN: Duration = Duration::from_millis(500);
/// Drain when even the initial signal could not be delivered.
const SIGNAL_FAILED_DRAIN: Duration = Duration::from_millis(100);

/// Terminate a child process, returning its exit status when the reap
/// completed in time.
///
/// `Ok(None)` means the child was already gone in a way that left no
/// status to collect. `Err` with `TimedOut` means the force-kill was
/// delivered but the reap never finished inside the drain window; the
/// process is dead or dying, but unreachable.
pub fn terminate(mut child: Box<dyn Child + Send + Sync>) -> io::Result<Option<ExitStatus>> {
    // Already exited and reaped.
    if let Ok(Some(status)) = child.try_wait() {
        return Ok(Some(status));
    }

    let pid = child.process_id();
    let mut killer = child.clone_killer();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(child.wait());
    });

    if !send_graceful_signal(pid) {
        // The graceful signal could not be delivered; force-kill and
        // drain briefly. The process may simply already be dead.
        if let Err(kill_err) = killer.kill() {
            return match rx.recv_timeout(SIGNAL_FAILED_DRAIN) {
                Ok(result) => result.map(Some),
                Err(_) => Err(kill_err),
            };
        }
        return match rx.recv_timeout(SIGNAL_FAILED_DRAIN) {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        };
    }

    match rx.recv_timeout(GRACEFUL_TIMEOUT) {
        Ok(result) => result.map(Some),
        Err(_) => {
            let kill_result = killer.kill();
            match rx.recv_timeout(KILL_DRAIN) {
                Ok(result) => result.map(Some),
                Err(_) => {
                    if let Err(e) = kill_result {
                        tracing::warn!("force-kill failed while terminating child: {}", e);
                    }
                    Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "child did not exit within the termination deadline",
                    ))
                }
            }
        }
    }
}

#[cfg(unix)]
fn send_graceful_signal(pid: Option<u32>) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match pid {
        Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok(),
        None => false,
    }
}

#[cfg(not(unix))]
fn send_graceful_signal(_pid: Option<u32>) -> bool {
    // No SIGTERM equivalent worth distinguishing from a kill here; let
    // the caller fall through to the force-kill path.
    false
}
