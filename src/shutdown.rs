//! SIGINT/SIGTERM handling for the sampling loop.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use libc::c_int;
use crate::errors::MonitorError;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

const SLICE: Duration = Duration::from_millis(50);

extern "C" fn on_signal(_sig: c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Cancellation flag raised by an interrupt, checked between ticks and while sleeping.
#[derive(Clone, Copy, Debug)]
pub struct Shutdown {
    _private: (),
}

impl Shutdown {
    pub fn install() -> Result<Self, MonitorError> {
        for sig in [libc::SIGINT, libc::SIGTERM] {
            unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction = on_signal as extern "C" fn(c_int) as libc::sighandler_t;
                libc::sigemptyset(&mut action.sa_mask);
                if libc::sigaction(sig, &action, std::ptr::null_mut()) != 0 {
                    return Err(MonitorError::Signal(io::Error::last_os_error()));
                }
            }
        }
        Ok(Self { _private: () })
    }

    pub fn requested(&self) -> bool {
        INTERRUPTED.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless interrupted first. Returns `false` on interrupt.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.requested() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(SLICE));
        }
    }
}
