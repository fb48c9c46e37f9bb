//! Interval throughput reporting
//!
//! The report window is an explicit timestamp advanced by exactly one window
//! per emitted report. It never re-syncs to the wall clock, so a delayed
//! sender produces back-to-back catch-up reports rather than skipped ones.

use std::fmt;
use std::time::{Duration, Instant};

/// One interval report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportLine {
    /// Start of the window that just closed, relative to run start
    pub window_offset: Duration,
    /// Time since run start when the report fired
    pub elapsed: Duration,
    /// Cumulative messages sent
    pub sent: u64,
    /// Messages sent since the previous report
    pub interval_count: u64,
    /// Interval rate over the actual time since the previous report
    pub rate: f64,
}

impl ReportLine {
    /// Interval rate truncated to whole Hz.
    pub fn rate_hz(&self) -> u64 {
        self.rate as u64
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ms: Sent {} - {} since last report ({} Hz)",
            self.elapsed.as_millis(),
            self.sent,
            self.interval_count,
            self.rate_hz()
        )
    }
}

/// Fixed-step interval reporter
#[derive(Debug, Clone)]
pub struct IntervalReporter {
    run_start: Instant,
    window: Duration,
    window_start: Instant,
    sent_at_window_start: u64,
    last_report_time: Instant,
}

impl IntervalReporter {
    pub fn new(run_start: Instant, window: Duration) -> Self {
        Self {
            run_start,
            window,
            window_start: run_start,
            sent_at_window_start: 0,
            last_report_time: run_start,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Start of the currently open window.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Record a successful send; returns a report if a window closed.
    pub fn on_sent(&mut self, now: Instant, sent: u64) -> Option<ReportLine> {
        debug_assert!(sent >= self.sent_at_window_start);
        self.maybe_report(now, sent)
    }

    /// Emit a report if the open window has fully elapsed.
    ///
    /// Exactly-on-boundary does not fire yet.
    pub fn maybe_report(&mut self, now: Instant, sent: u64) -> Option<ReportLine> {
        if now <= self.window_start + self.window {
            return None;
        }

        let interval_count = sent.saturating_sub(self.sent_at_window_start);
        let since_last = now
            .saturating_duration_since(self.last_report_time)
            .as_secs_f64();
        let rate = if since_last > 0.0 {
            interval_count as f64 / since_last
        } else {
            0.0
        };

        let line = ReportLine {
            window_offset: self.window_start.saturating_duration_since(self.run_start),
            elapsed: now.saturating_duration_since(self.run_start),
            sent,
            interval_count,
            rate,
        };

        self.window_start += self.window;
        self.sent_at_window_start = sent;
        self.last_report_time = now;

        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_boundary_is_exclusive() {
        let start = Instant::now();
        let mut reporter = IntervalReporter::new(start, SECOND);

        assert!(reporter.on_sent(start + SECOND, 10).is_none());
        let line = reporter
            .on_sent(start + SECOND + Duration::from_micros(1), 11)
            .expect("window should close");
        assert_eq!(line.sent, 11);
        assert_eq!(line.interval_count, 11);
        assert_eq!(line.window_offset, Duration::ZERO);
    }

    #[test]
    fn test_rate_uses_actual_elapsed_time() {
        let start = Instant::now();
        let mut reporter = IntervalReporter::new(start, SECOND);

        // Fires 2s in, the interval rate covers the full 2s
        let line = reporter.on_sent(start + 2 * SECOND, 500).unwrap();
        assert_eq!(line.rate_hz(), 250);
        assert_eq!(line.elapsed, 2 * SECOND);

        // Next window closes at 2s; measured from the previous report
        let line = reporter
            .on_sent(start + 2 * SECOND + Duration::from_millis(500), 600)
            .unwrap();
        assert_eq!(line.interval_count, 100);
        assert_eq!(line.rate_hz(), 200);
    }

    #[test]
    fn test_window_advances_by_fixed_step() {
        let start = Instant::now();
        let mut reporter = IntervalReporter::new(start, SECOND);

        // A sender stalled for 3.5s triggers catch-up reports on the next
        // sends, one window per report.
        let late = start + Duration::from_millis(3500);
        let mut lines = Vec::new();
        for sent in 1..=5 {
            if let Some(line) = reporter.on_sent(late + Duration::from_micros(sent), sent) {
                lines.push(line);
            }
        }

        assert_eq!(lines.len(), 3);
        for pair in lines.windows(2) {
            assert_eq!(pair[1].window_offset - pair[0].window_offset, SECOND);
        }
        assert_eq!(reporter.window_start(), start + 3 * SECOND);
        assert_eq!(lines[0].interval_count, 1);
        assert_eq!(lines[1].interval_count, 1);
    }

    #[test]
    fn test_report_line_format() {
        let line = ReportLine {
            window_offset: Duration::ZERO,
            elapsed: Duration::from_micros(1_000_700),
            sent: 1001,
            interval_count: 1001,
            rate: 999.9,
        };
        assert_eq!(
            line.to_string(),
            "1000 ms: Sent 1001 - 1001 since last report (999 Hz)"
        );
    }
}
