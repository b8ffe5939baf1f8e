//! `velos-middleware` – in-process transport for the control plane.
//!
//! # Modules
//!
//! - [`message`] – the [`Topic`] lanes and the [`Message`] envelope carried
//!   on them.
//! - [`bus`] – topic-based publish/subscribe built on Tokio broadcast
//!   channels, with bounded-wait batch receives.
//! - [`monitor`] – per-topic liveness, frequency and validity tracking for
//!   the inputs a cycle depends on.

pub mod bus;
pub mod message;
pub mod monitor;

pub use bus::{MessageBus, TopicReceiver};
pub use message::{Message, Payload, Topic};
pub use monitor::TopicMonitor;
