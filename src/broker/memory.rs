//! In-process broker
//!
//! Routes like an AMQP direct exchange: the default exchange (`""`) delivers
//! to the queue named by the routing key, named exchanges deliver through
//! explicit bindings. Messages that match no queue are dropped and counted,
//! as a broker does for non-mandatory publishes.

use super::{Broker, Envelope, Message};
use crate::error::BrokerError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug)]
struct Queued {
    delivery_tag: u64,
    exchange: String,
    routing_key: String,
    message: Message,
}

#[derive(Debug, Default)]
struct State {
    queues: HashMap<String, VecDeque<Queued>>,
    /// (exchange, routing key) -> queue names
    bindings: HashMap<(String, String), Vec<String>>,
    next_tag: u64,
    published: u64,
    unroutable: u64,
}

/// Cloneable handle to a shared in-memory broker
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue if it does not exist yet.
    pub fn declare_queue(&self, name: &str) {
        self.state
            .lock()
            .queues
            .entry(name.to_string())
            .or_default();
    }

    /// Route `exchange`/`routing_key` to `queue`, declaring the queue.
    pub fn bind(&self, exchange: &str, routing_key: &str, queue: &str) {
        let mut state = self.state.lock();
        state.queues.entry(queue.to_string()).or_default();
        let bound = state
            .bindings
            .entry((exchange.to_string(), routing_key.to_string()))
            .or_default();
        if !bound.iter().any(|q| q == queue) {
            bound.push(queue.to_string());
        }
    }

    /// Pop the oldest message from a queue.
    pub fn consume(&self, queue: &str) -> Option<Envelope> {
        let mut state = self.state.lock();
        let queued = state.queues.get_mut(queue)?.pop_front()?;
        Some(envelope(queued))
    }

    /// Take every message currently in a queue.
    pub fn drain(&self, queue: &str) -> Vec<Envelope> {
        let mut state = self.state.lock();
        match state.queues.get_mut(queue) {
            Some(queued) => queued.drain(..).map(envelope).collect(),
            None => Vec::new(),
        }
    }

    pub fn queue_len(&self, queue: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Messages accepted by `publish`, routed or not.
    pub fn published(&self) -> u64 {
        self.state.lock().published
    }

    /// Messages that matched no queue.
    pub fn unroutable(&self) -> u64 {
        self.state.lock().unroutable
    }
}

impl Broker for MemoryBroker {
    fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: &Message,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.published += 1;

        let targets: Vec<String> = if exchange.is_empty() {
            if state.queues.contains_key(routing_key) {
                vec![routing_key.to_string()]
            } else {
                Vec::new()
            }
        } else {
            state
                .bindings
                .get(&(exchange.to_string(), routing_key.to_string()))
                .cloned()
                .unwrap_or_default()
        };

        if targets.is_empty() {
            state.unroutable += 1;
            trace!(exchange, routing_key, "Unroutable message dropped");
            return Ok(());
        }

        for queue in targets {
            state.next_tag += 1;
            let queued = Queued {
                delivery_tag: state.next_tag,
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                message: message.clone(),
            };
            if let Some(q) = state.queues.get_mut(&queue) {
                q.push_back(queued);
            }
        }
        Ok(())
    }
}

fn envelope(queued: Queued) -> Envelope {
    Envelope {
        delivery_tag: queued.delivery_tag,
        exchange: queued.exchange,
        routing_key: queued.routing_key,
        content_type: None,
        body: queued.message.body().to_vec(),
    }
}
