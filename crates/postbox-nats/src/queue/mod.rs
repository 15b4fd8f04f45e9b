//! JetStream work queues.
//!
//! A relay queue named `orders` is backed by the stream `orders` capturing the
//! subject `orders.messages` with work-queue retention: a message is removed
//! once a consumer acknowledges it, or once it exceeds the [`QueueLimits`] of
//! the stream. Deliveries are pulled through the durable consumer
//! `orders-consumer`.

mod nats_queue;
mod subscription;
mod work_queue;

pub use nats_queue::NatsQueue;
pub use subscription::NatsSubscription;
pub use work_queue::{QueueLimits, WorkQueue};
