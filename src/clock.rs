//! Time sources for the emission loop
//!
//! Everything that measures elapsed time or waits goes through [`Clock`], so
//! the loop can run against the monotonic system clock or against a
//! [`ManualClock`] whose sleeps only move virtual time forward.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time provider with sub-millisecond resolution
pub trait Clock {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend the caller for roughly `duration`
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Wall clock backed by `Instant` and `thread::sleep`
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

#[derive(Debug, Default)]
struct ManualState {
    offset: Duration,
    sleeps: u64,
    slept: Duration,
}

/// Deterministic clock: time only moves on `advance` or `sleep`
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(ManualState::default()),
        }
    }

    /// Move virtual time forward without counting it as a sleep.
    pub fn advance(&self, by: Duration) {
        self.state.lock().offset += by;
    }

    /// Virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().offset
    }

    /// Number of `sleep` calls observed.
    pub fn sleep_count(&self) -> u64 {
        self.state.lock().sleeps
    }

    /// Total time spent in `sleep`.
    pub fn slept(&self) -> Duration {
        self.state.lock().slept
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.state.lock().offset
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.offset += duration;
        state.slept += duration;
        state.sleeps += 1;
    }
}
