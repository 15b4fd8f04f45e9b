//! Queue consumer worker.
//!
//! Materializes messages published in delegated mode by uploading each
//! delivered message to the object store.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use postbox_core::{
    BoxedSubscription, Delivery, MessageConsumer, QueueSubscriber, ServiceHealth,
};
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::service::ServiceState;

/// Tracing target for consumer worker operations.
const TRACING_TARGET: &str = "postbox_server::worker::consumer";

/// How long a single poll waits before checking for cancellation again.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a failed poll, and the first pause after a failed subscribe.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for the subscribe backoff.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Queue consumer worker.
///
/// Subscribes to the relay queue and hands every delivery to a
/// [`MessageConsumer`]. Successful deliveries are acknowledged; failed ones are
/// negatively acknowledged so the queue redelivers them. A failed subscribe is
/// retried with exponential backoff until it succeeds or the worker is cancelled.
pub struct ConsumerWorker {
    subscriber: Arc<dyn QueueSubscriber>,
    consumer: MessageConsumer,
    retry_delay: Duration,
}

impl ConsumerWorker {
    /// Creates a new consumer worker.
    pub fn new(subscriber: Arc<dyn QueueSubscriber>, consumer: MessageConsumer) -> Self {
        Self {
            subscriber,
            consumer,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Sets the pause after a failed poll and the initial subscribe backoff.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Creates a worker over the queue and store of the application state.
    pub fn from_state(state: &ServiceState) -> Self {
        Self::new(state.subscriber(), MessageConsumer::from_ref(state))
    }

    /// Runs the worker until cancelled.
    ///
    /// Logs lifecycle events (start, stop, errors) internally.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            target: TRACING_TARGET,
            queue = %self.consumer.queue_name(),
            "Starting consumer worker"
        );

        let result = self.run_inner(cancel).await;

        match &result {
            Ok(()) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    "Consumer worker stopped"
                );
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %err,
                    "Consumer worker failed"
                );
            }
        }

        result
    }

    async fn run_inner(&self, cancel: CancellationToken) -> Result<()> {
        let Some(mut subscription) = self.subscribe(&cancel).await else {
            return Ok(());
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(
                        target: TRACING_TARGET,
                        "Consumer worker shutdown requested"
                    );
                    break;
                }
                result = subscription.next_with_timeout(POLL_TIMEOUT) => {
                    match result {
                        Ok(Some(delivery)) => self.process(delivery).await,
                        Ok(None) => {}
                        Err(err) => {
                            tracing::error!(
                                target: TRACING_TARGET,
                                error = %err,
                                "Error receiving message from queue"
                            );
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Subscribes to the relay queue, retrying until cancelled.
    ///
    /// Returns `None` if the worker was cancelled first.
    async fn subscribe(&self, cancel: &CancellationToken) -> Option<BoxedSubscription> {
        let queue = self.consumer.queue_name();
        let mut delay = self.retry_delay;
        let mut attempt: u32 = 1;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                result = self.subscriber.subscribe(queue) => match result {
                    Ok(subscription) => {
                        if attempt > 1 {
                            tracing::info!(
                                target: TRACING_TARGET,
                                queue = %queue,
                                attempt,
                                "Subscribed to queue after retrying"
                            );
                        }
                        return Some(subscription);
                    }
                    Err(err) => {
                        let health = self
                            .subscriber
                            .health_check()
                            .await
                            .unwrap_or_else(|e| ServiceHealth::unhealthy(e.to_string()));
                        tracing::error!(
                            target: TRACING_TARGET,
                            error = %err,
                            queue = %queue,
                            attempt,
                            queue_health = ?health.status,
                            retry_in_ms = delay.as_millis() as u64,
                            "Failed to subscribe to queue"
                        );
                    }
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                () = tokio::time::sleep(delay) => {}
            }

            delay = (delay * 2).min(MAX_RETRY_DELAY);
            attempt = attempt.saturating_add(1);
        }
    }

    async fn process(&self, delivery: Delivery) {
        let uuid = delivery.message().uuid;
        let attempt = delivery.attempt();

        match self.consumer.handle(delivery.message()).await {
            Ok(()) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    uuid = %uuid,
                    attempt,
                    "Message stored"
                );

                if let Err(ack_err) = delivery.ack().await {
                    tracing::error!(
                        target: TRACING_TARGET,
                        error = %ack_err,
                        uuid = %uuid,
                        "Failed to ack message"
                    );
                }
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %err,
                    uuid = %uuid,
                    attempt,
                    "Failed to store message"
                );

                if let Err(nak_err) = delivery.nak().await {
                    tracing::error!(
                        target: TRACING_TARGET,
                        error = %nak_err,
                        uuid = %uuid,
                        "Failed to nak message"
                    );
                }
            }
        }
    }
}

impl fmt::Debug for ConsumerWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerWorker")
            .field("queue", &self.consumer.queue_name())
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use postbox_core::{MessageRelay, RelayMode};
    use postbox_test::EphemeralEnvironment;

    use super::*;
    use crate::handler::test::create_test_state;

    /// Polls `condition` for up to two seconds.
    async fn eventually<F, Fut>(mut condition: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for _ in 0..200 {
            if condition().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    async fn object_count(env: &EphemeralEnvironment) -> usize {
        env.storage().object_count(env.bucket_name()).await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stores_delegated_messages() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let env_ref = &env;
        let state = create_test_state(&env, RelayMode::Delegated);
        let relay = MessageRelay::from_ref(&state);

        let cancel = CancellationToken::new();
        let worker = ConsumerWorker::from_state(&state);
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.run(cancel).await }
        });

        let uuid = relay.create("from the queue").await?;
        assert!(eventually(move || async move { object_count(env_ref).await == 1 }).await);
        assert_eq!(relay.get(uuid).await?.content, "from the queue");

        cancel.cancel();
        handle.await??;
        assert_eq!(env.queue().acked(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_upload_is_redelivered() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let env_ref = &env;
        let state = create_test_state(&env, RelayMode::Delegated);
        let relay = MessageRelay::from_ref(&state);
        env.storage().set_fail_upload(true);

        let cancel = CancellationToken::new();
        let worker = ConsumerWorker::from_state(&state);
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.run(cancel).await }
        });

        let uuid = relay.create("retry me").await?;
        assert!(eventually(move || async move { env_ref.queue().naked() >= 1 }).await);

        env.storage().set_fail_upload(false);
        assert!(eventually(move || async move { object_count(env_ref).await == 1 }).await);
        assert_eq!(relay.get(uuid).await?.content, "retry me");

        cancel.cancel();
        handle.await??;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscribe_is_retried_until_it_succeeds() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let env_ref = &env;
        let state = create_test_state(&env, RelayMode::Delegated);
        let relay = MessageRelay::from_ref(&state);
        env.queue().fail_next_subscribes(3);

        let cancel = CancellationToken::new();
        let worker = ConsumerWorker::from_state(&state).with_retry_delay(Duration::from_millis(5));
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.run(cancel).await }
        });

        let uuid = relay.create("after the outage").await?;
        assert!(eventually(move || async move { object_count(env_ref).await == 1 }).await);
        assert_eq!(relay.get(uuid).await?.content, "after the outage");
        assert_eq!(env.queue().subscribe_calls(), 4);
        assert!(!handle.is_finished());

        cancel.cancel();
        handle.await??;
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_interrupts_subscribe_backoff() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let state = create_test_state(&env, RelayMode::Delegated);
        env.queue().fail_next_subscribes(usize::MAX);

        let cancel = CancellationToken::new();
        let worker = ConsumerWorker::from_state(&state).with_retry_delay(Duration::from_secs(60));
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await???;
        assert_eq!(env.queue().subscribe_calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn stops_when_cancelled() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let state = create_test_state(&env, RelayMode::Delegated);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let worker = ConsumerWorker::from_state(&state);
        tokio::time::timeout(Duration::from_secs(1), worker.run(cancel)).await??;
        Ok(())
    }
}
