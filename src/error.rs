//! Error types for the producer and listener.
//!
//! - [`BrokerError`] is what a broker adapter reports for a single call.
//! - [`BrokerFailure`] is a protocol rejection that ended a run.
//! - [`RunError`] and [`ListenError`] are what a run or listener returns to
//!   the process boundary, each knowing its exit status.
//! - [`exit_status`] picks the status for whatever reached `main`.

use crate::config::ConfigError;
use thiserror::Error;

/// Exit status for usage and configuration errors (matches clap).
pub const EXIT_USAGE: i32 = 2;

/// Exit status for fatal errors that carry no broker reply code.
pub const EXIT_FAILURE: i32 = 1;

/// Failure reported by a broker adapter for one publish or consume.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker rejected the operation with an AMQP reply code.
    #[error("broker reply {code}: {text} (soft error: {soft})")]
    Protocol {
        /// AMQP reply code
        code: u16,
        /// AMQP reply text
        text: String,
        /// Channel-level (recoverable per the broker) rather than connection-level
        soft: bool,
    },

    /// Anything that did not come from the broker itself.
    #[error("local failure: {0}")]
    Local(String),
}

impl BrokerError {
    pub fn protocol(code: u16, text: impl Into<String>, soft: bool) -> Self {
        BrokerError::Protocol {
            code,
            text: text.into(),
            soft,
        }
    }

    pub fn local(text: impl Into<String>) -> Self {
        BrokerError::Local(text.into())
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, BrokerError::Protocol { .. })
    }

    /// The reply code for a broker rejection, [`EXIT_FAILURE`] otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            BrokerError::Protocol { code, .. } => i32::from(*code),
            BrokerError::Local(_) => EXIT_FAILURE,
        }
    }

    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::Protocol { soft: true, .. } => "broker_soft_error",
            BrokerError::Protocol { soft: false, .. } => "broker_hard_error",
            BrokerError::Local(_) => "local_error",
        }
    }
}

/// A protocol-level rejection that terminated the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("AmqpException: is soft error: {soft}, reply code: {code}, reply text: {text}")]
pub struct BrokerFailure {
    pub code: u16,
    pub text: String,
    pub soft: bool,
}

impl BrokerFailure {
    /// The broker's reply code, used verbatim as the process exit status.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.code)
    }
}

/// Why an emission run did not complete.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunError {
    /// Rejected before the loop started.
    #[error("invalid run configuration: {0}")]
    Config(#[from] ConfigError),

    /// The broker rejected a publish.
    #[error(transparent)]
    Broker(#[from] BrokerFailure),

    /// Local failures kept repeating without a successful publish in between.
    #[error("giving up after {failures} consecutive local publish failures; last: {last}")]
    TransientLimit {
        /// Length of the failure streak
        failures: u32,
        /// The most recent failure
        last: String,
    },
}

impl RunError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => EXIT_USAGE,
            RunError::Broker(failure) => failure.exit_code(),
            RunError::TransientLimit { .. } => EXIT_FAILURE,
        }
    }

    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RunError::Config(err) => err.as_label(),
            RunError::Broker(_) => "run_broker_rejected",
            RunError::TransientLimit { .. } => "run_transient_limit",
        }
    }
}

/// Why the listener stopped.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ListenError {
    /// The consumer could not be registered.
    #[error("could not consume from queue '{queue}': {source}")]
    Subscribe {
        queue: String,
        #[source]
        source: BrokerError,
    },

    /// The broker closed the channel or connection while consuming.
    #[error(transparent)]
    Broker(#[from] BrokerFailure),

    /// Opening or closing the connection failed.
    #[error("broker connection failed: {0}")]
    Connection(#[source] BrokerError),
}

impl ListenError {
    /// The listener reports every broker failure as a plain failure status.
    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }
}

/// Exit status for an error that reached the process boundary.
///
/// Walks the cause chain so a broker rejection keeps its reply code even
/// when it surfaces outside a run, under added context.
pub fn exit_status(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(run) = cause.downcast_ref::<RunError>() {
            return run.exit_code();
        }
        if let Some(listen) = cause.downcast_ref::<ListenError>() {
            return listen.exit_code();
        }
        if let Some(failure) = cause.downcast_ref::<BrokerFailure>() {
            return failure.exit_code();
        }
        if let Some(broker) = cause.downcast_ref::<BrokerError>() {
            return broker.exit_code();
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return EXIT_USAGE;
        }
    }
    EXIT_FAILURE
}
