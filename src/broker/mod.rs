//! Broker adapters
//!
//! The emission loop only needs [`Broker::publish`]; the listener consumes
//! [`Envelope`]s. `AmqpBroker` talks to a real server through amiquip,
//! `MemoryBroker` keeps everything in process.

mod amqp;
mod memory;
mod message;

pub use amqp::AmqpBroker;
pub use memory::MemoryBroker;
pub use message::{Envelope, Message};

use crate::error::BrokerError;

/// Publish side of a broker connection
pub trait Broker {
    /// Publish one message. Synchronous: returns once the client has handed
    /// the message off or the broker has refused it.
    fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: &Message,
    ) -> Result<(), BrokerError>;

    /// Wait until everything published so far has been accepted.
    ///
    /// Clients that publish without waiting for the broker only learn about
    /// a rejection on a later call; this is that call for the last message.
    fn flush(&mut self) -> Result<(), BrokerError> {
        Ok(())
    }
}

impl<B: Broker + ?Sized> Broker for &mut B {
    fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: &Message,
    ) -> Result<(), BrokerError> {
        (**self).publish(exchange, routing_key, message)
    }

    fn flush(&mut self) -> Result<(), BrokerError> {
        (**self).flush()
    }
}

impl<B: Broker + ?Sized> Broker for Box<B> {
    fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: &Message,
    ) -> Result<(), BrokerError> {
        (**self).publish(exchange, routing_key, message)
    }

    fn flush(&mut self) -> Result<(), BrokerError> {
        (**self).flush()
    }
}
