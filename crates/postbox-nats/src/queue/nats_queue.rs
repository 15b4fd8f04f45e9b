//! [`QueuePublisher`] and [`QueueSubscriber`] over JetStream work queues.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use postbox_core::{
    BoxedSubscription, ErrorKind, Message, QueuePublisher, QueueSubscriber, ServiceHealth,
};
use tokio::sync::RwLock;

use super::work_queue::{QueueLimits, WorkQueue};
use crate::{NatsClient, Result};

/// Relay queue backed by NATS JetStream.
///
/// Streams are opened on first use and cached for the lifetime of the value.
#[derive(Clone)]
pub struct NatsQueue {
    client: NatsClient,
    limits: QueueLimits,
    queues: Arc<RwLock<HashMap<String, WorkQueue>>>,
}

impl NatsQueue {
    /// Creates a queue backend over an established connection.
    ///
    /// Streams created by this backend use the retention limits of the client
    /// configuration.
    pub fn new(client: NatsClient) -> Self {
        Self {
            limits: QueueLimits::from_config(client.config()),
            client,
            queues: Arc::default(),
        }
    }

    /// Returns the work queue for `queue`, creating its stream if necessary.
    pub async fn work_queue(&self, queue: &str) -> Result<WorkQueue> {
        if let Some(work_queue) = self.queues.read().await.get(queue) {
            return Ok(work_queue.clone());
        }

        let mut queues = self.queues.write().await;
        if let Some(work_queue) = queues.get(queue) {
            return Ok(work_queue.clone());
        }

        let work_queue = WorkQueue::new(self.client.jetstream(), queue, self.limits).await?;
        queues.insert(queue.to_owned(), work_queue.clone());
        Ok(work_queue)
    }
}

#[async_trait::async_trait]
impl QueuePublisher for NatsQueue {
    async fn publish(&self, queue: &str, message: &Message) -> postbox_core::Result<()> {
        let work_queue = self
            .work_queue(queue)
            .await
            .map_err(|e| e.into_relay(ErrorKind::Publish))?;

        work_queue
            .publish(message)
            .await
            .map_err(|e| e.into_relay(ErrorKind::Publish))
    }

    async fn health_check(&self) -> postbox_core::Result<ServiceHealth> {
        Ok(self.client.health().await)
    }
}

#[async_trait::async_trait]
impl QueueSubscriber for NatsQueue {
    async fn subscribe(&self, queue: &str) -> postbox_core::Result<BoxedSubscription> {
        let work_queue = self
            .work_queue(queue)
            .await
            .map_err(|e| e.into_relay(ErrorKind::Subscription))?;

        let subscription = work_queue
            .subscribe()
            .await
            .map_err(|e| e.into_relay(ErrorKind::Subscription))?;

        Ok(Box::new(subscription))
    }

    async fn health_check(&self) -> postbox_core::Result<ServiceHealth> {
        Ok(self.client.health().await)
    }
}

impl fmt::Debug for NatsQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsQueue")
            .field("client", &self.client)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use postbox_core::QueueSubscription;
    use uuid::Uuid;

    use super::*;
    use crate::NatsConfig;

    async fn connect() -> NatsQueue {
        let url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
        let client = NatsClient::connect(NatsConfig::new(url)).await.unwrap();
        NatsQueue::new(client)
    }

    #[tokio::test]
    #[ignore = "requires a running NATS server (NATS_URL)"]
    async fn publish_then_receive() {
        let nats = connect().await;
        let queue = format!("message-queue-{}", Uuid::new_v4());
        let message = Message::new("over the wire");

        nats.publish(&queue, &message).await.unwrap();

        let mut subscription = nats.subscribe(&queue).await.unwrap();
        let delivery = subscription
            .next_with_timeout(Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.message(), &message);
        assert_eq!(delivery.attempt(), 1);
        delivery.ack().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running NATS server (NATS_URL)"]
    async fn invalid_queue_name_is_configuration_error() {
        let nats = connect().await;
        let error = nats
            .publish("orders.created", &Message::new("x"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }
}
