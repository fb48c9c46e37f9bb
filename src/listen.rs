//! Queue listener
//!
//! Prints every delivered envelope. A broker-side close ends the listener
//! with an error; local hiccups are logged and consumption continues.

use crate::broker::Envelope;
use crate::dump::print_envelope;
use crate::error::{BrokerError, BrokerFailure, ListenError};
use std::io::Write;
use tracing::{error, info, warn};

/// What a consumer can hand the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeEvent {
    Delivery(Envelope),
    Failed(BrokerError),
    /// The consumer stopped without a broker error.
    Closed(String),
}

/// Drive the listener over a stream of consume events.
///
/// Returns the number of envelopes printed once the stream ends or the
/// consumer closes.
pub fn listen<I, W>(events: I, out: &mut W) -> Result<u64, ListenError>
where
    I: IntoIterator<Item = ConsumeEvent>,
    W: Write,
{
    let mut delivered = 0;
    for event in events {
        match event {
            ConsumeEvent::Delivery(envelope) => {
                delivered += 1;
                if let Err(err) = print_envelope(&envelope, out) {
                    warn!(error = %err, delivery_tag = envelope.delivery_tag, "Failed to print delivery");
                }
            }
            ConsumeEvent::Failed(BrokerError::Protocol { code, text, soft }) => {
                error!(
                    reply_code = code,
                    reply_text = %text,
                    soft_error = soft,
                    "Broker closed consumer"
                );
                return Err(BrokerFailure { code, text, soft }.into());
            }
            ConsumeEvent::Failed(BrokerError::Local(text)) => {
                warn!(error = %text, "Local consume failure, continuing");
            }
            ConsumeEvent::Closed(reason) => {
                info!(reason = %reason, delivered, "Consumer closed");
                break;
            }
        }
    }
    Ok(delivered)
}
