//! Publish failure classification
//!
//! Protocol rejections end the run with the broker's reply code; local
//! failures are logged and the loop carries on, up to a configurable streak.

use crate::error::{BrokerError, BrokerFailure, RunError};
use tracing::{error, warn};

/// Tracks publish failures for one run
#[derive(Debug, Clone, Default)]
pub struct FailureSink {
    max_consecutive_local: u32,
    consecutive_local: u32,
    total_local: u64,
}

impl FailureSink {
    /// `max_consecutive_local == 0` tolerates any number of local failures.
    pub fn new(max_consecutive_local: u32) -> Self {
        Self {
            max_consecutive_local,
            ..Default::default()
        }
    }

    /// Classify a failed publish.
    ///
    /// `Ok(())` means the run continues; any error must abort it.
    pub fn on_publish_failure(&mut self, err: BrokerError) -> Result<(), RunError> {
        match err {
            BrokerError::Protocol { code, text, soft } => {
                error!(
                    reply_code = code,
                    reply_text = %text,
                    soft_error = soft,
                    "Broker rejected publish, aborting run"
                );
                Err(BrokerFailure { code, text, soft }.into())
            }
            BrokerError::Local(text) => {
                self.consecutive_local += 1;
                self.total_local += 1;
                warn!(
                    error = %text,
                    consecutive = self.consecutive_local,
                    "Local publish failure, continuing"
                );
                if self.max_consecutive_local > 0
                    && self.consecutive_local > self.max_consecutive_local
                {
                    return Err(RunError::TransientLimit {
                        failures: self.consecutive_local,
                        last: text,
                    });
                }
                Ok(())
            }
        }
    }

    /// A publish went through; the local failure streak is over.
    pub fn on_publish_success(&mut self) {
        self.consecutive_local = 0;
    }

    /// Local failures seen over the whole run.
    pub fn local_failures(&self) -> u64 {
        self.total_local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_are_fatal_even_when_soft() {
        let mut sink = FailureSink::new(10);
        let err = sink
            .on_publish_failure(BrokerError::protocol(404, "NOT_FOUND", true))
            .unwrap_err();
        match err {
            RunError::Broker(failure) => {
                assert_eq!(failure.code, 404);
                assert!(failure.soft);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_local_errors_continue() {
        let mut sink = FailureSink::new(0);
        for _ in 0..10_000 {
            assert!(sink.on_publish_failure(BrokerError::local("EAGAIN")).is_ok());
        }
        assert_eq!(sink.local_failures(), 10_000);
    }

    #[test]
    fn test_local_streak_limit() {
        let mut sink = FailureSink::new(2);
        assert!(sink.on_publish_failure(BrokerError::local("a")).is_ok());
        assert!(sink.on_publish_failure(BrokerError::local("b")).is_ok());
        sink.on_publish_success();
        assert!(sink.on_publish_failure(BrokerError::local("c")).is_ok());
        assert!(sink.on_publish_failure(BrokerError::local("d")).is_ok());

        let err = sink.on_publish_failure(BrokerError::local("e")).unwrap_err();
        assert!(matches!(
            err,
            RunError::TransientLimit { failures: 3, ref last } if last == "e"
        ));
        assert_eq!(sink.local_failures(), 5);
    }
}
