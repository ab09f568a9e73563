//! Termination signals.
//!
//! SIGINT/SIGTERM/SIGHUP/SIGQUIT set a flag that the UI loop polls; the
//! loop then performs an orderly shutdown (terminate children, drain the
//! IPC server, restore the terminal) and exits with code 130. The
//! handler itself only flips the flag; everything else happens on the
//! UI thread.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
pub fn reset_for_test() {
    SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
}

pub fn install_signal_handlers() {
    #[cfg(unix)]
    unix::install();
}

#[cfg(unix)]
mod unix {
    use super::*;
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    extern "C" fn termination_handler(_: libc::c_int) {
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
    }

    pub fn install() {
        let handler = SigHandler::Handler(termination_handler);
        let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());

        for signal in [
            Signal::SIGINT,
            Signal::SIGTERM,
            Signal::SIGHUP,
            Signal::SIGQUIT,
        ] {
            // SAFETY: the handler only performs an atomic store.
            unsafe {
                if let Err(e) = sigaction(signal, &action) {
                    tracing::error!("failed to install {:?} handler: {}", signal, e);
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn raising_sigterm_sets_the_flag() {
        reset_for_test();
        install_signal_handlers();
        assert!(!shutdown_requested());

        unsafe {
            libc::raise(libc::SIGTERM);
        }

        assert!(shutdown_requested());
    }
}
