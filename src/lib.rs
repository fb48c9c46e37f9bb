//! Rate-controlled AMQP producer
//!
//! Publishes a fixed number of messages to an exchange at a bounded average
//! rate and reports throughput while doing so:
//!
//! - **Throttling**: whole-run average limiter with sub-millisecond re-checks
//! - **Reporting**: fixed-step one-second windows with per-interval rates
//! - **Failure handling**: broker rejections end the run with the broker's
//!   reply code, local failures are logged and retried
//! - **Listening**: consume a queue and hex-dump every delivery
//!
//! # Architecture
//!
//! [`EmissionDriver`] owns the loop. It asks the [`ratelimit::Throttle`]
//! for permission before every send, publishes through a [`broker::Broker`],
//! feeds the [`report::IntervalReporter`] after every send and hands
//! failures to the [`failure::FailureSink`]. Time comes from a
//! [`clock::Clock`] so the loop runs the same against the system clock and
//! a manual one.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "connection": {
//!     "host": "localhost",
//!     "port": 5672,
//!     "username": "guest",
//!     "password": "guest"
//!   },
//!   "run": {
//!     "exchange": "amq.direct",
//!     "routing-key": "load",
//!     "rate-limit": 500,
//!     "message-count": 10000,
//!     "body-size": 256
//!   }
//! }
//! ```

pub mod broker;
pub mod clock;
pub mod config;
pub mod driver;
pub mod dump;
pub mod error;
pub mod failure;
pub mod listen;
pub mod ratelimit;
pub mod report;

// Re-export main types
pub use config::ProducerConfig;
pub use driver::{EmissionDriver, RunSummary};
pub use error::{BrokerError, RunError};
