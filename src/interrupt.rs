//! Ctrl-C handling.
//!
//! The first SIGINT fires the shared cancel token: the command being waited
//! on is abandoned, its connection released and the remaining hosts skipped.
//! A second SIGINT gets the default behaviour and ends the process at once.

use hostexec::CancelToken;
use std::sync::OnceLock;

/// Exit status after an interrupted run (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

static CANCEL: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn on_sigint(_signal: libc::c_int) {
    if let Some(token) = CANCEL.get() {
        token.cancel();
    }
    // SAFETY: signal() is async-signal-safe; restoring the default
    // disposition touches no Rust state.
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}

/// Install the SIGINT handler and return the token it fires.
pub fn install() -> CancelToken {
    let token = CANCEL.get_or_init(CancelToken::new).clone();
    // SAFETY: the handler only performs an atomic store and a signal() call.
    let previous = unsafe {
        libc::signal(
            libc::SIGINT,
            on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t,
        )
    };
    if previous == libc::SIG_ERR {
        log::warn!("Could not install Ctrl-C handler; interrupts will not clean up");
    }
    token
}
