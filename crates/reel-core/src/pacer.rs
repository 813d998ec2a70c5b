//! Fixed post-request delay for the catalog API.
//!
//! The catalog throttles clients that issue requests back to back, so every
//! call is followed by the configured delay whether it succeeded or not.

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

/// Blocks the current thread for a duration.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Sleeper that only advances a counter. Clones share the same clock.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    elapsed: Rc<Cell<Duration>>,
    sleeps: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    pub fn sleeps(&self) -> u64 {
        self.sleeps.get()
    }
}

impl Sleeper for ManualClock {
    fn sleep(&self, duration: Duration) {
        self.elapsed.set(self.elapsed.get() + duration);
        self.sleeps.set(self.sleeps.get() + 1);
    }
}

pub struct RequestPacer {
    delay: Duration,
    sleeper: Box<dyn Sleeper>,
    requests: u64,
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer")
            .field("delay", &self.delay)
            .field("requests", &self.requests)
            .finish()
    }
}

impl RequestPacer {
    pub fn new(delay: Duration) -> Self {
        Self::with_sleeper(delay, ThreadSleeper)
    }

    pub fn with_sleeper<S: Sleeper + 'static>(delay: Duration, sleeper: S) -> Self {
        Self {
            delay,
            sleeper: Box::new(sleeper),
            requests: 0,
        }
    }

    /// Runs one request, then waits out the delay regardless of its outcome.
    pub fn call<T>(&mut self, request: impl FnOnce() -> T) -> T {
        let outcome = request();
        self.requests += 1;
        self.sleeper.sleep(self.delay);
        outcome
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }
}
