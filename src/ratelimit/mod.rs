//! Rate limiting module
//!
//! Provides the whole-run average throttle used by the emission loop.

mod throttle;

pub use throttle::{permitted, Throttle};
