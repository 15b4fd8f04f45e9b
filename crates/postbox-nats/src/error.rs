//! Error types and utilities for NATS operations.

use std::time::Duration;

use postbox_core::ErrorKind;

/// Result type for all NATS operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for NATS operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// NATS client/connection errors
    #[error("NATS connection error: {0}")]
    Connection(#[from] async_nats::Error),

    /// Serialization errors when sending or receiving messages
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation timeout
    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Message delivery failed
    #[error("Message delivery failed to subject '{subject}': {reason}")]
    DeliveryFailed { subject: String, reason: String },

    /// Stream operation failed
    #[error("Stream operation failed on '{stream}': {error}")]
    StreamError { stream: String, error: String },

    /// Consumer operation failed
    #[error("Consumer '{consumer}' error: {reason}")]
    ConsumerError { consumer: String, reason: String },

    /// Acknowledgement error
    #[error("Acknowledgement error: {0}")]
    Ack(String),

    /// Object not found in store
    #[error("Object '{name}' not found in bucket '{bucket}'")]
    ObjectNotFound { bucket: String, name: String },

    /// Invalid configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Generic operation error with context
    #[error("NATS operation failed: {operation} - {details}")]
    Operation { operation: String, details: String },
}

impl Error {
    /// Create a delivery failed error
    pub fn delivery_failed(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Create a stream error
    pub fn stream_error(stream: impl Into<String>, error: impl Into<String>) -> Self {
        Self::StreamError {
            stream: stream.into(),
            error: error.into(),
        }
    }

    /// Create a consumer error
    pub fn consumer_error(consumer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConsumerError {
            consumer: consumer.into(),
            reason: reason.into(),
        }
    }

    /// Create an operation error with context
    pub fn operation(op: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Operation {
            operation: op.into(),
            details: details.into(),
        }
    }

    /// Create an object not found error
    pub fn object_not_found(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a timeout error with the given duration
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { timeout: duration }
    }

    /// Converts into a relay error.
    ///
    /// Missing objects, invalid configuration and payload errors keep their own kind;
    /// every other failure takes `fallback`, the kind of the operation that failed.
    pub fn into_relay(self, fallback: ErrorKind) -> postbox_core::Error {
        let kind = match &self {
            Error::ObjectNotFound { .. } => ErrorKind::NotFound,
            Error::InvalidConfig { .. } => ErrorKind::Configuration,
            Error::Serialization(_) => ErrorKind::Serialization,
            _ => fallback,
        };

        let message = self.to_string();
        postbox_core::Error::new(kind)
            .with_message(message)
            .with_source(self)
    }
}
