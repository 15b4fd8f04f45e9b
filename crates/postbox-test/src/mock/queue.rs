//! In-memory work queue.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use postbox_core::{
    BoxedSubscription, Delivery, DeliveryHandle, Error, Message, QueuePublisher, QueueSubscriber,
    QueueSubscription, Result, ServiceHealth,
};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::TRACING_TARGET;

/// Default maximum age of a pending delivery.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default maximum number of pending deliveries per queue.
const DEFAULT_MAX_PENDING: usize = 10_000;

/// A work queue kept in process memory.
///
/// Published messages are serialized to their JSON wire form and parsed again on
/// delivery. Each message is handed to exactly one subscriber; a nak'ed delivery is
/// appended to the back of its queue with the attempt counter incremented.
///
/// Like a bounded JetStream stream, each queue discards its oldest deliveries once
/// they exceed the maximum age or the pending limit.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<QueueState>,
}

#[derive(Debug, Default)]
struct QueueState {
    queues: Mutex<HashMap<String, VecDeque<Pending>>>,
    published: Mutex<Vec<(String, Message)>>,
    notify: Notify,
    limits: Limits,
    fail_publish: AtomicBool,
    fail_subscribe: AtomicUsize,
    subscribe_calls: AtomicUsize,
    unhealthy: AtomicBool,
    acked: AtomicUsize,
    naked: AtomicUsize,
    terminated: AtomicUsize,
    discarded: AtomicUsize,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    max_age: Duration,
    max_pending: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

impl Limits {
    /// Drops expired and excess deliveries from the front of `entries`.
    fn trim(&self, entries: &mut VecDeque<Pending>) -> usize {
        let mut discarded = 0;
        while let Some(front) = entries.front() {
            if front.enqueued_at.elapsed() <= self.max_age && entries.len() <= self.max_pending {
                break;
            }
            entries.pop_front();
            discarded += 1;
        }
        discarded
    }
}

#[derive(Debug)]
struct Pending {
    payload: Vec<u8>,
    attempt: u64,
    enqueued_at: Instant,
}

impl Pending {
    fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            attempt: 1,
            enqueued_at: Instant::now(),
        }
    }
}

impl QueueState {
    fn health(&self) -> ServiceHealth {
        if self.unhealthy.load(Ordering::SeqCst) {
            return ServiceHealth::unhealthy("memory queue marked unhealthy");
        }
        ServiceHealth::healthy()
    }

    async fn enqueue(&self, queue: &str, pending: Pending) {
        let mut queues = self.queues.lock().await;
        let entries = queues.entry(queue.to_owned()).or_default();
        entries.push_back(pending);
        let discarded = self.limits.trim(entries);
        drop(queues);

        self.record_discarded(queue, discarded);
        self.notify.notify_waiters();
    }

    async fn pop(&self, queue: &str) -> Option<Pending> {
        let mut queues = self.queues.lock().await;
        let entries = queues.get_mut(queue)?;
        let discarded = self.limits.trim(entries);
        let pending = entries.pop_front();
        drop(queues);

        self.record_discarded(queue, discarded);
        pending
    }

    fn record_discarded(&self, queue: &str, discarded: usize) {
        if discarded > 0 {
            tracing::debug!(
                target: TRACING_TARGET,
                queue = %queue,
                discarded,
                "Discarded deliveries over the queue limits"
            );
            self.discarded.fetch_add(discarded, Ordering::SeqCst);
        }
    }
}

impl MemoryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty queue with custom retention limits.
    pub fn with_limits(max_age: Duration, max_pending: usize) -> Self {
        let state = QueueState {
            limits: Limits {
                max_age,
                max_pending,
            },
            ..Default::default()
        };

        Self {
            inner: Arc::new(state),
        }
    }

    /// Makes every subsequent publish fail with a publish error.
    pub fn set_fail_publish(&self, fail: bool) {
        self.inner.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` subscribe calls fail with a subscription error.
    pub fn fail_next_subscribes(&self, count: usize) {
        self.inner.fail_subscribe.store(count, Ordering::SeqCst);
    }

    /// Returns the number of subscribe calls, failed ones included.
    pub fn subscribe_calls(&self) -> usize {
        self.inner.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Makes health checks report the queue as unhealthy.
    pub fn set_healthy(&self, healthy: bool) {
        self.inner.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    /// Enqueues a raw payload, bypassing serialization.
    pub async fn publish_raw(&self, queue: &str, payload: impl Into<Vec<u8>>) {
        self.inner.enqueue(queue, Pending::new(payload.into())).await;
    }

    /// Returns every message accepted by [`QueuePublisher::publish`] on `queue`.
    pub async fn published(&self, queue: &str) -> Vec<Message> {
        let published = self.inner.published.lock().await;
        published
            .iter()
            .filter(|(name, _)| name == queue)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Returns the number of deliveries waiting on `queue`.
    pub async fn pending(&self, queue: &str) -> usize {
        let queues = self.inner.queues.lock().await;
        queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Returns the number of acknowledged deliveries.
    pub fn acked(&self) -> usize {
        self.inner.acked.load(Ordering::SeqCst)
    }

    /// Returns the number of negatively acknowledged deliveries.
    pub fn naked(&self) -> usize {
        self.inner.naked.load(Ordering::SeqCst)
    }

    /// Returns the number of malformed payloads that were dropped.
    pub fn terminated(&self) -> usize {
        self.inner.terminated.load(Ordering::SeqCst)
    }

    /// Returns the number of deliveries dropped by the retention limits.
    pub fn discarded(&self) -> usize {
        self.inner.discarded.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl QueuePublisher for MemoryQueue {
    async fn publish(&self, queue: &str, message: &Message) -> Result<()> {
        if self.inner.fail_publish.load(Ordering::SeqCst) {
            return Err(Error::publish().with_message(format!("queue '{queue}' is unavailable")));
        }

        let pending = Pending::new(message.to_bytes()?);
        self.inner.enqueue(queue, pending).await;

        let mut published = self.inner.published.lock().await;
        published.push((queue.to_owned(), message.clone()));
        Ok(())
    }

    async fn health_check(&self) -> Result<ServiceHealth> {
        Ok(self.inner.health())
    }
}

#[async_trait::async_trait]
impl QueueSubscriber for MemoryQueue {
    async fn subscribe(&self, queue: &str) -> Result<BoxedSubscription> {
        self.inner.subscribe_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.inner.fail_subscribe.load(Ordering::SeqCst);
        if remaining > 0 {
            self.inner.fail_subscribe.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::subscription()
                .with_message(format!("queue '{queue}' cannot be subscribed to")));
        }

        Ok(Box::new(MemorySubscription {
            state: self.inner.clone(),
            queue: queue.to_owned(),
        }))
    }

    async fn health_check(&self) -> Result<ServiceHealth> {
        Ok(self.inner.health())
    }
}

/// Subscription on a single [`MemoryQueue`] queue.
struct MemorySubscription {
    state: Arc<QueueState>,
    queue: String,
}

#[async_trait::async_trait]
impl QueueSubscription for MemorySubscription {
    async fn next_with_timeout(&mut self, timeout: Duration) -> Result<Option<Delivery>> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(pending) = self.state.pop(&self.queue).await {
                match Message::from_slice(&pending.payload) {
                    Ok(message) => {
                        let handle = MemoryDeliveryHandle {
                            state: self.state.clone(),
                            queue: self.queue.clone(),
                            pending,
                        };
                        let attempt = handle.pending.attempt;
                        let delivery = Delivery::new(message, attempt, Box::new(handle));
                        return Ok(Some(delivery));
                    }
                    Err(err) => {
                        tracing::warn!(
                            target: TRACING_TARGET,
                            queue = %self.queue,
                            error = %err,
                            "Dropping malformed payload"
                        );
                        self.state.terminated.fetch_add(1, Ordering::SeqCst);
                        continue;
                    }
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}

struct MemoryDeliveryHandle {
    state: Arc<QueueState>,
    queue: String,
    pending: Pending,
}

#[async_trait::async_trait]
impl DeliveryHandle for MemoryDeliveryHandle {
    async fn ack(self: Box<Self>) -> Result<()> {
        self.state.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nak(self: Box<Self>) -> Result<()> {
        let Self {
            state,
            queue,
            pending,
        } = *self;

        state.naked.fetch_add(1, Ordering::SeqCst);
        let pending = Pending {
            attempt: pending.attempt + 1,
            ..pending
        };
        state.enqueue(&queue, pending).await;
        Ok(())
    }
}
