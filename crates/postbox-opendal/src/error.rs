//! Storage error types.

use postbox_core::ErrorKind;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to initialize the storage backend.
    #[error("storage initialization failed: {0}")]
    Init(String),

    /// Object not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(opendal::Error),
}

impl StorageError {
    /// Creates a new initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Converts into a relay error.
    ///
    /// `fallback` is the kind of the operation that failed (`Upload` or `Io`).
    pub fn into_relay(self, fallback: ErrorKind) -> postbox_core::Error {
        let kind = match &self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Init(_) => ErrorKind::Configuration,
            Self::PermissionDenied(_) | Self::Backend(_) => fallback,
        };

        let message = self.to_string();
        postbox_core::Error::new(kind)
            .with_message(message)
            .with_source(self)
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        use opendal::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(err.to_string()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            _ => Self::Backend(err),
        }
    }
}
