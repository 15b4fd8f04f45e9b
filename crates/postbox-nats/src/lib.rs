#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for NATS client operations.
///
/// Use this target for logging client initialization, configuration, and client-level errors.
pub const TRACING_TARGET_CLIENT: &str = "postbox_nats::client";

/// Tracing target for NATS connection operations.
///
/// Use this target for logging connection establishment, reconnection, and connection errors.
pub const TRACING_TARGET_CONNECTION: &str = "postbox_nats::connection";

/// Tracing target for NATS object store operations.
pub const TRACING_TARGET_OBJECT: &str = "postbox_nats::object";

/// Tracing target for JetStream work queue operations.
pub const TRACING_TARGET_QUEUE: &str = "postbox_nats::queue";

mod client;
mod error;
mod names;
pub mod object;
pub mod queue;

// Re-export async_nats types needed by consumers
pub use async_nats::jetstream;
pub use client::{NatsClient, NatsConfig};
pub use error::{Error, Result};
pub use names::validate as validate_name;
pub use object::NatsObjectStorage;
pub use queue::NatsQueue;
