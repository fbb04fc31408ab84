//! SIGUSR1-based wake-from-blocking-I/O.
//!
//! A worker stuck in a blocking syscall (a `read` on a socket with no
//! traffic, an `XLRReadFifo` equivalent) has no portable timeout. The only
//! portable POSIX way to break it out is to deliver a signal whose handler
//! does nothing but exists, so the syscall returns `EINTR` instead of the
//! thread silently blocking forever. Each worker installs this handler once
//! on boot; cancellation then raises `SIGUSR1` against the worker's thread
//! id.

use std::sync::Once;

extern "C" fn noop_handler(_sig: libc::c_int) {}

static INSTALL: Once = Once::new();

/// Installs an empty `SIGUSR1` handler for the process. Idempotent: later
/// calls from other worker threads are no-ops since the handler is
/// process-wide, but every worker should still call this on boot in case it
/// is the first.
pub fn install_handler() {
    INSTALL.call_once(|| unsafe {
        libc::signal(libc::SIGUSR1, noop_handler as libc::sighandler_t);
    });
}

/// Sends `SIGUSR1` to a specific thread, interrupting any blocking syscall
/// it is parked in.
///
/// # Safety
/// `tid` must be a thread id obtained from `libc::pthread_self` on a thread
/// that is still alive; sending to a reused id is harmless (it just
/// interrupts whatever now owns it) but sending to a garbage value is UB per
/// `pthread_kill`'s contract.
pub fn interrupt_thread(tid: libc::pthread_t) {
    unsafe {
        libc::pthread_kill(tid, libc::SIGUSR1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_is_idempotent() {
        install_handler();
        install_handler();
    }
}
