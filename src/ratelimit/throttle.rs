//! Whole-run average throttle
//!
//! A send is permitted while the average rate over the entire run so far,
//! `sent / elapsed`, stays at or below the limit. There is no burst
//! allowance: running ahead early is only paid back by slowing everything
//! that follows.

use crate::clock::Clock;
use std::time::{Duration, Instant};
use tracing::trace;

/// Decide whether the next send may go out now.
///
/// The first send (`elapsed == 0`) is always permitted.
pub fn permitted(sent: u64, elapsed: Duration, rate_limit: f64) -> bool {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return true;
    }
    sent as f64 / secs <= rate_limit
}

/// Throttle gate for a single emission run
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    rate_limit: f64,
    quantum: Duration,
}

impl Throttle {
    pub fn new(rate_limit: f64, quantum: Duration) -> Self {
        Self {
            rate_limit,
            quantum,
        }
    }

    pub fn rate_limit(&self) -> f64 {
        self.rate_limit
    }

    pub fn quantum(&self) -> Duration {
        self.quantum
    }

    /// Block until a send is permitted, re-checking after every quantum.
    ///
    /// Returns the number of quanta slept.
    pub fn wait<C: Clock>(&self, clock: &C, start: Instant, sent: u64) -> u64 {
        let mut quanta = 0;
        while !permitted(
            sent,
            clock.now().saturating_duration_since(start),
            self.rate_limit,
        ) {
            clock.sleep(self.quantum);
            quanta += 1;
        }
        if quanta > 0 {
            trace!(sent, quanta, "Throttled before publish");
        }
        quanta
    }
}
