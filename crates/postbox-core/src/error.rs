//! Relay error type shared by all backends.

use strum::{AsRefStr, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with the relay [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of failures surfaced by the relay and its collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The queue was unreachable or rejected the message.
    Publish,
    /// The object store was unreachable or failed during a write.
    Upload,
    /// No object exists under the requested key.
    NotFound,
    /// Reading or decoding a stored object failed.
    Io,
    /// The asynchronous consumer failed to store a delivered message.
    ConsumerProcessing,
    /// A queue subscription could not be created or polled.
    Subscription,
    /// A message could not be (de)serialized.
    Serialization,
    /// Relay or backend configuration is invalid.
    Configuration,
}

/// A structured error for relay operations.
#[derive(Debug, Error)]
#[error("{}{}", kind.as_ref(), message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional error message.
    pub message: Option<String>,
    /// Optional source error.
    #[source]
    pub source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a source error to this error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Creates a new publish error.
    pub fn publish() -> Self {
        Self::new(ErrorKind::Publish)
    }

    /// Creates a new upload error.
    pub fn upload() -> Self {
        Self::new(ErrorKind::Upload)
    }

    /// Creates a new not found error.
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Creates a new I/O error.
    pub fn io() -> Self {
        Self::new(ErrorKind::Io)
    }

    /// Creates a new consumer processing error.
    pub fn consumer_processing() -> Self {
        Self::new(ErrorKind::ConsumerProcessing)
    }

    /// Creates a new subscription error.
    pub fn subscription() -> Self {
        Self::new(ErrorKind::Subscription)
    }

    /// Creates a new serialization error.
    pub fn serialization() -> Self {
        Self::new(ErrorKind::Serialization)
    }

    /// Creates a new configuration error.
    pub fn configuration() -> Self {
        Self::new(ErrorKind::Configuration)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind.into()
    }

    /// Returns `true` if the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization()
            .with_message("invalid message payload")
            .with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let error = Error::not_found().with_message("object 'abc' does not exist");
        assert_eq!(error.to_string(), "not_found: object 'abc' does not exist");
    }

    #[test]
    fn display_without_message() {
        assert_eq!(Error::publish().to_string(), "publish");
        assert_eq!(Error::consumer_processing().kind_str(), "consumer_processing");
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::other("disk full");
        let error = Error::upload().with_source(io);
        assert!(error.source().is_some());
        assert_eq!(error.kind(), ErrorKind::Upload);
    }

    #[test]
    fn serde_errors_become_serialization() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let error = Error::from(err);
        assert_eq!(error.kind(), ErrorKind::Serialization);
        assert!(!error.is_not_found());
    }
}
