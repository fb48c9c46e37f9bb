//! Message payloads and delivered envelopes

use std::sync::Arc;

/// Immutable payload shared by every publish of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: Arc<[u8]>,
}

impl Message {
    pub fn new(body: impl Into<Arc<[u8]>>) -> Self {
        Self { body: body.into() }
    }

    /// `size` bytes counting up from 0x00, wrapping after 0xff.
    pub fn patterned(size: usize) -> Self {
        let body: Vec<u8> = (0..size).map(|i| i as u8).collect();
        Self::new(body)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// A delivered message with its routing metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterned_body_counts_up_and_wraps() {
        let message = Message::patterned(300);
        assert_eq!(message.len(), 300);
        assert_eq!(message.body()[0], 0x00);
        assert_eq!(message.body()[0x41], b'A');
        assert_eq!(message.body()[255], 0xff);
        assert_eq!(message.body()[256], 0x00);
    }

    #[test]
    fn test_clones_share_the_body() {
        let message = Message::patterned(256);
        let copy = message.clone();
        assert!(std::ptr::eq(message.body(), copy.body()));
        assert!(Message::patterned(0).is_empty());
    }
}
