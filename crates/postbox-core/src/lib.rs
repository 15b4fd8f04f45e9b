#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for relay operations.
pub const TRACING_TARGET_RELAY: &str = "postbox_core::relay";

/// Tracing target for queue consumer operations.
pub const TRACING_TARGET_CONSUMER: &str = "postbox_core::consumer";

mod config;
mod consumer;
mod error;
mod health;
mod message;
mod relay;

pub mod queue;
pub mod storage;

pub use config::{RelayConfig, RelayMode};
pub use consumer::MessageConsumer;
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use health::{ServiceHealth, ServiceStatus};
pub use message::Message;
pub use queue::{
    BoxedSubscription, Delivery, DeliveryHandle, QueuePublisher, QueueSubscriber,
    QueueSubscription,
};
pub use relay::MessageRelay;
pub use storage::ObjectStorage;
