//! AMQP 0-9-1 broker adapter
//!
//! Wraps the amiquip client. Channel-level closes from the server are soft
//! protocol errors, connection-level closes are hard ones, everything else
//! amiquip reports is treated as a local failure.

use super::{Broker, Envelope, Message};
use crate::config::ConnectionConfig;
use crate::error::{BrokerError, ListenError};
use crate::listen::{listen, ConsumeEvent};
use amiquip::{Channel, Connection, ConsumerMessage, ConsumerOptions, Delivery, Publish};
use std::io::Write;
use tracing::{debug, info};

/// Single connection with one channel
pub struct AmqpBroker {
    channel: Channel,
    connection: Connection,
}

impl AmqpBroker {
    /// Open a plain TCP connection and a channel on it.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, BrokerError> {
        info!(url = %config.redacted_url(), "Connecting to broker");

        let mut connection = Connection::insecure_open(&config.url())?;
        let channel = connection.open_channel(None)?;

        debug!(host = %config.host, port = config.port, "Channel open");
        Ok(Self {
            channel,
            connection,
        })
    }

    /// Consume from `queue` until the consumer stops, dumping every delivery
    /// to `out`. Deliveries are not acknowledged individually (no-ack mode).
    pub fn listen<W: Write>(&self, queue: &str, out: &mut W) -> Result<u64, ListenError> {
        let options = ConsumerOptions {
            no_ack: true,
            ..ConsumerOptions::default()
        };
        let consumer = self
            .channel
            .basic_consume(queue, options)
            .map_err(|err| ListenError::Subscribe {
                queue: queue.to_string(),
                source: err.into(),
            })?;

        info!(queue, "Consuming");

        let events = consumer.receiver().iter().map(|message| match message {
            ConsumerMessage::Delivery(delivery) => ConsumeEvent::Delivery(envelope(delivery)),
            ConsumerMessage::ServerClosedChannel(err) => ConsumeEvent::Failed(err.into()),
            ConsumerMessage::ServerClosedConnection(err) => ConsumeEvent::Failed(err.into()),
            ConsumerMessage::ServerCancelled => {
                ConsumeEvent::Closed("consumer cancelled by server".to_string())
            }
            _ => ConsumeEvent::Closed("consumer stopped".to_string()),
        });

        listen(events, out)
    }

    /// Close the channel, then the connection.
    pub fn close(self) -> Result<(), BrokerError> {
        self.channel.close()?;
        self.connection.close()?;
        Ok(())
    }
}

impl Broker for AmqpBroker {
    fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: &Message,
    ) -> Result<(), BrokerError> {
        self.channel
            .basic_publish(exchange, Publish::new(message.body(), routing_key))?;
        Ok(())
    }

    /// `basic.publish` is fire-and-forget; a synchronous `basic.qos`
    /// round-trip surfaces any channel close the broker sent in between.
    fn flush(&mut self) -> Result<(), BrokerError> {
        self.channel.qos(0, 0, false)?;
        Ok(())
    }
}

impl From<amiquip::Error> for BrokerError {
    fn from(err: amiquip::Error) -> Self {
        match err {
            amiquip::Error::ServerClosedChannel { code, message, .. } => {
                BrokerError::protocol(code, message, true)
            }
            amiquip::Error::ServerClosedConnection { code, message, .. } => {
                BrokerError::protocol(code, message, false)
            }
            other => BrokerError::local(other.to_string()),
        }
    }
}

fn envelope(delivery: Delivery) -> Envelope {
    let delivery_tag = delivery.delivery_tag();
    let content_type = delivery
        .properties
        .content_type()
        .as_ref()
        .map(ToString::to_string);
    Envelope {
        delivery_tag,
        exchange: delivery.exchange,
        routing_key: delivery.routing_key,
        content_type,
        body: delivery.body,
    }
}
