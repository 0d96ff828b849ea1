//! Signal handling for graceful early termination.
//!
//! SIGTERM and SIGINT set an atomic shutdown flag; the sampling loop
//! polls it at each period boundary, so a termination request still
//! closes the counter source and the sink. Signal handlers must be
//! async-signal-safe, so only atomics are touched from them.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::debug;

static SHUTDOWN_FLAG: AtomicBool = AtomicBool::new(false);
static SIGNAL_COUNT: AtomicU32 = AtomicU32::new(0);

/// Handle for checking termination requests.
///
/// The underlying flag is process-global: one sampling session per
/// process invocation is assumed.
#[derive(Debug, Clone, Copy)]
pub struct SignalHandler {
    _private: (),
}

impl SignalHandler {
    /// Register handlers for SIGTERM and SIGINT.
    ///
    /// On non-Unix platforms only manual shutdown requests are
    /// supported.
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        install_unix_handlers()?;
        Ok(Self { _private: () })
    }

    /// Whether a termination signal (or manual request) was received.
    #[inline]
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        SHUTDOWN_FLAG.load(Ordering::Relaxed)
    }

    /// Manually request shutdown (used by tests).
    pub fn request_shutdown(&self) {
        SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
    }

    /// Number of termination signals received.
    #[must_use]
    pub fn signal_count(&self) -> u32 {
        SIGNAL_COUNT.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    fn reset(&self) {
        SHUTDOWN_FLAG.store(false, Ordering::Relaxed);
        SIGNAL_COUNT.store(0, Ordering::Relaxed);
    }
}

#[cfg(unix)]
fn install_unix_handlers() -> std::io::Result<()> {
    use std::os::raw::c_int;

    extern "C" fn on_terminate(_: c_int) {
        SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
        SIGNAL_COUNT.fetch_add(1, Ordering::Relaxed);
    }

    #[allow(unsafe_code)]
    unsafe {
        if libc::signal(libc::SIGTERM, on_terminate as libc::sighandler_t) == libc::SIG_ERR {
            return Err(std::io::Error::last_os_error());
        }
        if libc::signal(libc::SIGINT, on_terminate as libc::sighandler_t) == libc::SIG_ERR {
            return Err(std::io::Error::last_os_error());
        }
    }

    debug!("signal handlers registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_shutdown_request() {
        let handler = SignalHandler::install().unwrap();
        handler.reset();
        assert!(!handler.shutdown_requested());

        handler.request_shutdown();
        assert!(handler.shutdown_requested());

        handler.reset();
    }
}
