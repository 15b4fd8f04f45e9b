//! Pull subscription yielding relay deliveries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{self, AckKind, consumer};
use futures::StreamExt;
use postbox_core::{Delivery, DeliveryHandle, ErrorKind, Message, QueueSubscription};
use tokio::time::Instant;

use crate::{Error, TRACING_TARGET_QUEUE};

/// Delay requested from the server before redelivering a nak'ed message.
const NAK_DELAY: Duration = Duration::from_secs(5);

/// Messages pulled from a durable work-queue consumer.
pub struct NatsSubscription {
    queue: Arc<str>,
    messages: consumer::pull::Stream,
}

impl NatsSubscription {
    pub(crate) fn new(queue: Arc<str>, messages: consumer::pull::Stream) -> Self {
        Self { queue, messages }
    }

    /// Returns the queue name.
    pub fn queue(&self) -> &str {
        &self.queue
    }
}

#[async_trait::async_trait]
impl QueueSubscription for NatsSubscription {
    async fn next_with_timeout(
        &mut self,
        timeout: Duration,
    ) -> postbox_core::Result<Option<Delivery>> {
        let deadline = Instant::now() + timeout;

        loop {
            let message = match tokio::time::timeout_at(deadline, self.messages.next()).await {
                Err(_) => return Ok(None),
                Ok(None) => {
                    return Err(postbox_core::Error::subscription()
                        .with_message(format!("message stream for '{}' closed", self.queue)));
                }
                Ok(Some(Err(e))) => {
                    return Err(postbox_core::Error::subscription()
                        .with_message(format!("failed to receive from '{}'", self.queue))
                        .with_source(e));
                }
                Ok(Some(Ok(message))) => message,
            };

            let attempt = message
                .info()
                .map(|info| info.delivered.max(1) as u64)
                .unwrap_or(1);

            match Message::from_slice(&message.payload) {
                Ok(parsed) => {
                    let handle = NatsDeliveryHandle { message };
                    return Ok(Some(Delivery::new(parsed, attempt, Box::new(handle))));
                }
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET_QUEUE,
                        queue = %self.queue,
                        subject = %message.subject,
                        error = %err,
                        "Terminating malformed message"
                    );

                    if let Err(e) = message.ack_with(AckKind::Term).await {
                        tracing::error!(
                            target: TRACING_TARGET_QUEUE,
                            queue = %self.queue,
                            error = %e,
                            "Failed to terminate malformed message"
                        );
                    }
                }
            }
        }
    }
}

impl fmt::Debug for NatsSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsSubscription")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

struct NatsDeliveryHandle {
    message: jetstream::Message,
}

#[async_trait::async_trait]
impl DeliveryHandle for NatsDeliveryHandle {
    async fn ack(self: Box<Self>) -> postbox_core::Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| Error::Ack(e.to_string()).into_relay(ErrorKind::Subscription))
    }

    async fn nak(self: Box<Self>) -> postbox_core::Result<()> {
        self.message
            .ack_with(AckKind::Nak(Some(NAK_DELAY)))
            .await
            .map_err(|e| Error::Ack(e.to_string()).into_relay(ErrorKind::Subscription))
    }
}
