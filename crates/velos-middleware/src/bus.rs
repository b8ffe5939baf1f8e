//! Topic-based publish/subscribe message bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others. Slow subscribers lose the oldest messages, which is the right
//! trade-off for a fixed-rate loop: stale samples are worthless.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::warn;

use crate::message::{Message, Payload, Topic};

/// Default channel capacity (number of buffered messages before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared message bus. Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct MessageBus {
    senders: Arc<Vec<broadcast::Sender<Message>>>,
}

impl MessageBus {
    /// Create a new bus with the given per-topic channel capacity.
    pub fn new(capacity: usize) -> Self {
        let senders = Topic::ALL
            .iter()
            .map(|_| broadcast::channel(capacity).0)
            .collect();
        Self {
            senders: Arc::new(senders),
        }
    }

    /// Publish `message` on `topic`.
    ///
    /// Returns the number of receivers that were handed the message; `0`
    /// when nobody is listening, which is a normal condition.
    pub fn publish(&self, topic: Topic, message: Message) -> usize {
        self.sender(topic).send(message).unwrap_or(0)
    }

    /// Wrap `payload` in a fresh [`Message`] and publish it.
    pub fn publish_payload(&self, topic: Topic, payload: Payload, valid: bool, mono_time: u64) -> usize {
        self.publish(topic, Message::new(payload, valid, mono_time))
    }

    /// Subscribe to a single topic. Only messages published after this call
    /// are delivered.
    pub fn subscribe(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.sender(topic).subscribe(),
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Message> {
        &self.senders[topic.index()]
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`MessageBus::subscribe`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Message>,
}

impl TopicReceiver {
    /// Wait for the next message on this topic.
    ///
    /// Lag is logged and skipped over. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-buffered message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything currently buffered, oldest first.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(message) = self.try_recv() {
            out.push(message);
        }
        out
    }

    /// Wait at most `timeout` for a first message, then drain whatever else
    /// is buffered. An empty result means nothing arrived in time.
    pub async fn recv_batch(&mut self, timeout: Duration) -> Vec<Message> {
        let mut batch = self.drain();
        if batch.is_empty() {
            match tokio::time::timeout(timeout, self.recv()).await {
                Ok(Some(first)) => {
                    batch.push(first);
                    batch.extend(self.drain());
                }
                Ok(None) | Err(_) => {}
            }
        }
        batch
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
