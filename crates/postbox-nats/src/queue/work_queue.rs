//! One JetStream stream acting as a relay queue.

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{self, consumer, stream};
use postbox_core::Message;

use super::subscription::NatsSubscription;
use crate::{Error, NatsConfig, Result, TRACING_TARGET_QUEUE, names};

/// How long the server waits for an ack before redelivering.
const ACK_WAIT: Duration = Duration::from_secs(60);

/// Maximum number of deliveries per message.
const MAX_DELIVER: i64 = 5;

/// Retention limits of a queue stream.
///
/// Work-queue retention only removes acknowledged messages, and a direct-mode
/// deployment never acknowledges anything, so every stream is bounded by age and
/// size. The oldest messages are discarded first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    /// Maximum age of a stored message.
    pub max_age: Duration,
    /// Maximum size of the stream in bytes.
    pub max_bytes: i64,
}

impl QueueLimits {
    /// Reads the limits from the connection configuration.
    pub fn from_config(config: &NatsConfig) -> Self {
        Self {
            max_age: config.queue_max_age(),
            max_bytes: i64::try_from(config.queue_max_bytes()).unwrap_or(i64::MAX),
        }
    }
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self::from_config(&NatsConfig::default())
    }
}

/// A work-queue stream for one relay queue.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    jetstream: jetstream::Context,
    name: Arc<str>,
    subject: Arc<str>,
}

impl WorkQueue {
    /// Opens the stream for `queue`, creating it if it does not exist yet.
    #[tracing::instrument(skip(jetstream), target = TRACING_TARGET_QUEUE)]
    pub async fn new(
        jetstream: &jetstream::Context,
        queue: &str,
        limits: QueueLimits,
    ) -> Result<Self> {
        names::validate("queue", queue)?;
        let subject = Self::subject_for(queue);

        match jetstream.get_stream(queue).await {
            Ok(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_QUEUE,
                    stream = %queue,
                    "Using existing queue stream"
                );
            }
            Err(_) => {
                tracing::info!(
                    target: TRACING_TARGET_QUEUE,
                    stream = %queue,
                    subject = %subject,
                    max_age_secs = limits.max_age.as_secs(),
                    max_bytes = limits.max_bytes,
                    "Creating new queue stream"
                );

                jetstream
                    .create_stream(Self::stream_config(queue, limits))
                    .await
                    .map_err(|e| Error::stream_error(queue, e.to_string()))?;
            }
        }

        Ok(Self {
            jetstream: jetstream.clone(),
            name: Arc::from(queue),
            subject: Arc::from(subject),
        })
    }

    /// Returns the stream configuration for `queue`.
    pub fn stream_config(queue: &str, limits: QueueLimits) -> stream::Config {
        stream::Config {
            name: queue.to_owned(),
            description: Some(format!("postbox queue: {queue}")),
            subjects: vec![Self::subject_for(queue)],
            retention: stream::RetentionPolicy::WorkQueue,
            discard: stream::DiscardPolicy::Old,
            max_age: limits.max_age,
            max_bytes: limits.max_bytes,
            ..Default::default()
        }
    }

    /// Returns the subject messages for `queue` are published on.
    pub fn subject_for(queue: &str) -> String {
        format!("{queue}.messages")
    }

    /// Returns the durable consumer name for `queue`.
    pub fn consumer_for(queue: &str) -> String {
        format!("{queue}-consumer")
    }

    /// Returns the queue (and stream) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publishes `message` and waits for the stream to acknowledge it.
    #[tracing::instrument(skip_all, fields(queue = %self.name, uuid = %message.uuid))]
    pub async fn publish(&self, message: &Message) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        let payload_size = payload.len();

        self.jetstream
            .publish(self.subject.to_string(), payload.into())
            .await
            .map_err(|e| Error::delivery_failed(&*self.subject, e.to_string()))?
            .await
            .map_err(|e| Error::delivery_failed(&*self.subject, e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_QUEUE,
            subject = %self.subject,
            payload_size,
            "Published message"
        );
        Ok(())
    }

    /// Attaches to the durable pull consumer of this queue.
    #[tracing::instrument(skip(self), fields(queue = %self.name), target = TRACING_TARGET_QUEUE)]
    pub async fn subscribe(&self) -> Result<NatsSubscription> {
        let consumer_name = Self::consumer_for(&self.name);

        let config = consumer::pull::Config {
            name: Some(consumer_name.clone()),
            durable_name: Some(consumer_name.clone()),
            description: Some(format!("postbox consumer for {}", self.name)),
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: ACK_WAIT,
            max_deliver: MAX_DELIVER,
            filter_subject: self.subject.to_string(),
            ..Default::default()
        };

        let stream = self
            .jetstream
            .get_stream(&*self.name)
            .await
            .map_err(|e| Error::stream_error(&*self.name, e.to_string()))?;

        let consumer = stream
            .create_consumer(config)
            .await
            .map_err(|e| Error::consumer_error(&consumer_name, e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| Error::consumer_error(&consumer_name, e.to_string()))?;

        tracing::info!(
            target: TRACING_TARGET_QUEUE,
            consumer = %consumer_name,
            "Subscribed to queue"
        );

        Ok(NatsSubscription::new(self.name.clone(), messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_scheme() {
        assert_eq!(WorkQueue::subject_for("orders"), "orders.messages");
        assert_eq!(WorkQueue::consumer_for("orders"), "orders-consumer");
    }

    #[test]
    fn streams_are_bounded() {
        let config = WorkQueue::stream_config("orders", QueueLimits::default());

        assert_eq!(config.name, "orders");
        assert_eq!(config.subjects, vec!["orders.messages".to_owned()]);
        assert_eq!(config.retention, stream::RetentionPolicy::WorkQueue);
        assert_eq!(config.discard, stream::DiscardPolicy::Old);
        assert_eq!(config.max_age, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.max_bytes, 1 << 30);
    }

    #[test]
    fn limits_follow_configuration() {
        let nats = NatsConfig::new("nats://localhost:4222").with_queue_limits(600, 2048);
        let config = WorkQueue::stream_config("orders", QueueLimits::from_config(&nats));

        assert_eq!(config.max_age, Duration::from_secs(600));
        assert_eq!(config.max_bytes, 2048);
    }
}
