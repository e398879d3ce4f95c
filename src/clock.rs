use std::time::{Duration, Instant};

/// Time source and sleep used by the polling loop.
///
/// The monitor never calls `Instant::now` or `thread::sleep` directly, so
/// tests can drive the collection window without waiting on the wall clock.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// The real clock: `Instant::now` and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
