use nodescope::shutdown::Shutdown;
use std::time::{Duration, Instant};

// Raising the signal sets a process-wide flag, so this lives in its own test binary.
#[test]
fn sigint_cuts_sleep_short() {
    let shutdown = Shutdown::install().unwrap();
    assert!(!shutdown.requested());

    assert_eq!(unsafe { libc::raise(libc::SIGINT) }, 0);
    assert!(shutdown.requested());

    let start = Instant::now();
    assert!(!shutdown.sleep(Duration::from_secs(2)));
    assert!(start.elapsed() < Duration::from_millis(500));
}
