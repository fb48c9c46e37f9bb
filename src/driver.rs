//! Emission driver
//!
//! Runs the fixed-count send loop: throttle, publish, count, report. Report
//! lines and the final summary go to the caller's writer; diagnostics go
//! through `tracing`.

use crate::broker::{Broker, Message};
use crate::clock::Clock;
use crate::config::{ConfigError, RunConfig};
use crate::error::RunError;
use crate::failure::FailureSink;
use crate::ratelimit::Throttle;
use crate::report::IntervalReporter;

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a run that was not aborted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Messages the run was asked to send
    pub target_count: u64,
    /// Messages actually sent
    pub sent: u64,
    /// Wall time from loop start to the last send
    pub elapsed: Duration,
}

impl RunSummary {
    /// Messages per second over the whole run; zero for an empty run.
    pub fn overall_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if self.sent == 0 || secs == 0.0 {
            0.0
        } else {
            self.sent as f64 / secs
        }
    }

    /// False when the run was cancelled before reaching its target.
    pub fn is_complete(&self) -> bool {
        self.sent == self.target_count
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PRODUCER - Message count: {}", self.sent)?;
        writeln!(f, "Total time, milliseconds: {}", self.elapsed.as_millis())?;
        write!(
            f,
            "Overall messages-per-second: {}",
            general(self.overall_rate())
        )
    }
}

/// Six significant digits, trailing zeros dropped, switching to exponent
/// notation outside `1e-4..1e6` (C's `%g`).
fn general(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }

    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        return sci;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return sci;
    };

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    } else {
        let fixed = format!("{:.*}", (PRECISION - 1 - exponent) as usize, value);
        trim_fraction(&fixed).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Rate-controlled batch emitter
pub struct EmissionDriver<C: Clock> {
    clock: C,
    throttle: Throttle,
    report_interval: Duration,
    target_count: u64,
    exchange: String,
    routing_key: String,
    message: Message,
    failures: FailureSink,
    cancel: Option<Arc<AtomicBool>>,
}

impl<C: Clock> EmissionDriver<C> {
    /// Validate `config` and build the run's message.
    pub fn new(config: &RunConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            clock,
            throttle: Throttle::new(config.rate_limit, config.throttle_quantum()),
            report_interval: config.report_interval(),
            target_count: config.message_count,
            exchange: config.exchange.clone(),
            routing_key: config.routing_key.clone(),
            message: Message::patterned(config.body_size),
            failures: FailureSink::new(config.max_transient_failures),
            cancel: None,
        })
    }

    /// Stop between sends once `flag` is raised.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Local publish failures absorbed so far.
    pub fn local_failures(&self) -> u64 {
        self.failures.local_failures()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Publish `message_count` messages through `broker`.
    ///
    /// A broker rejection aborts immediately: no further publishes and no
    /// summary. That includes a rejection reported by the final
    /// [`Broker::flush`]. Failing to write a report line is logged and
    /// ignored.
    pub fn run<B, W>(&mut self, broker: &mut B, out: &mut W) -> Result<RunSummary, RunError>
    where
        B: Broker + ?Sized,
        W: Write,
    {
        info!(
            exchange = %self.exchange,
            routing_key = %self.routing_key,
            rate_limit = self.throttle.rate_limit(),
            message_count = self.target_count,
            body_size = self.message.len(),
            "Starting emission run"
        );

        let start = self.clock.now();
        let mut reporter = IntervalReporter::new(start, self.report_interval);
        let mut sent: u64 = 0;

        while sent < self.target_count {
            if self.is_cancelled() {
                warn!(sent, target = self.target_count, "Emission run cancelled");
                break;
            }

            self.throttle.wait(&self.clock, start, sent);

            match broker.publish(&self.exchange, &self.routing_key, &self.message) {
                Ok(()) => {
                    sent += 1;
                    self.failures.on_publish_success();
                    if let Some(line) = reporter.on_sent(self.clock.now(), sent) {
                        debug!(
                            sent = line.sent,
                            interval = line.interval_count,
                            rate = line.rate,
                            "Interval report"
                        );
                        if let Err(err) = writeln!(out, "{line}") {
                            warn!(error = %err, "Failed to write interval report");
                        }
                    }
                }
                Err(err) => self.failures.on_publish_failure(err)?,
            }
        }

        // A rejection of the last publish may only arrive now
        if let Err(err) = Broker::flush(broker) {
            self.failures.on_publish_failure(err)?;
        }

        let summary = RunSummary {
            target_count: self.target_count,
            sent,
            elapsed: self.clock.now().saturating_duration_since(start),
        };

        info!(
            sent = summary.sent,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            overall_rate = summary.overall_rate(),
            local_failures = self.failures.local_failures(),
            "Emission run finished"
        );
        if let Err(err) = writeln!(out, "{summary}").and_then(|_| out.flush()) {
            warn!(error = %err, "Failed to write run summary");
        }

        Ok(summary)
    }
}
