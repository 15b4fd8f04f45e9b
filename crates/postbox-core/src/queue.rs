//! Queue abstractions.
//!
//! The relay publishes through [`QueuePublisher`]. The consumer side obtains a
//! [`QueueSubscription`] from a [`QueueSubscriber`] and receives [`Delivery`]
//! values, each of which must be acknowledged or negatively acknowledged.
//! Delivery is at-least-once: a nak'ed or unacknowledged delivery is redelivered
//! with a higher attempt number.

use std::fmt;
use std::time::Duration;

use crate::{Message, Result, ServiceHealth};

/// Boxed subscription returned by [`QueueSubscriber::subscribe`].
pub type BoxedSubscription = Box<dyn QueueSubscription>;

/// Sends messages to a named queue.
#[async_trait::async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Serializes and sends `message` to `queue`.
    ///
    /// Returns once the queue has accepted the message.
    async fn publish(&self, queue: &str, message: &Message) -> Result<()>;

    /// Reports the health of the queue connection.
    async fn health_check(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth::healthy())
    }
}

/// Creates subscriptions on named queues.
#[async_trait::async_trait]
pub trait QueueSubscriber: Send + Sync {
    /// Subscribes to `queue`.
    async fn subscribe(&self, queue: &str) -> Result<BoxedSubscription>;

    /// Reports the health of the queue connection.
    async fn health_check(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth::healthy())
    }
}

/// An open subscription yielding deliveries.
#[async_trait::async_trait]
pub trait QueueSubscription: Send {
    /// Waits up to `timeout` for the next delivery.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    async fn next_with_timeout(&mut self, timeout: Duration) -> Result<Option<Delivery>>;
}

/// Backend-specific acknowledgement of a single delivery.
#[async_trait::async_trait]
pub trait DeliveryHandle: Send + Sync {
    /// Acknowledges the delivery; it will not be redelivered.
    async fn ack(self: Box<Self>) -> Result<()>;

    /// Rejects the delivery so the queue redelivers it.
    async fn nak(self: Box<Self>) -> Result<()>;
}

/// A message received from a queue, awaiting acknowledgement.
pub struct Delivery {
    message: Message,
    attempt: u64,
    handle: Box<dyn DeliveryHandle>,
}

impl Delivery {
    /// Wraps a received message with its acknowledgement handle.
    pub fn new(message: Message, attempt: u64, handle: Box<dyn DeliveryHandle>) -> Self {
        Self {
            message,
            attempt,
            handle,
        }
    }

    /// Returns the delivered message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns the delivery attempt, starting at 1.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Returns `true` if this message was delivered before.
    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }

    /// Acknowledges the delivery.
    pub async fn ack(self) -> Result<()> {
        self.handle.ack().await
    }

    /// Negatively acknowledges the delivery.
    pub async fn nak(self) -> Result<()> {
        self.handle.nak().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}
