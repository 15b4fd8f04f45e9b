//! Relay error to HTTP error conversion.

use postbox_core::ErrorKind as RelayErrorKind;

use super::http_error::{Error as HttpError, ErrorKind};

/// Tracing target for relay error conversions.
const TRACING_TARGET: &str = "postbox_server::handler::relay";

impl From<postbox_core::Error> for HttpError<'static> {
    fn from(error: postbox_core::Error) -> Self {
        if error.is_not_found() {
            tracing::debug!(
                target: TRACING_TARGET,
                error = %error,
                "Message not found"
            );
        } else {
            tracing::error!(
                target: TRACING_TARGET,
                error = %error,
                error_kind = error.kind_str(),
                "Relay operation failed"
            );
        }

        let context = error.to_string();

        match error.kind() {
            RelayErrorKind::NotFound => ErrorKind::NotFound
                .with_message("Message not found")
                .with_resource("message"),

            RelayErrorKind::Publish => ErrorKind::InternalServerError
                .with_message("Failed to publish message")
                .with_resource("queue")
                .with_context(context),

            RelayErrorKind::Upload => ErrorKind::InternalServerError
                .with_message("Failed to store message content")
                .with_resource("bucket")
                .with_context(context),

            RelayErrorKind::Io => ErrorKind::InternalServerError
                .with_message("Failed to read message content")
                .with_resource("bucket")
                .with_context(context),

            RelayErrorKind::Serialization => ErrorKind::InternalServerError
                .with_message("Failed to encode message")
                .with_context(context),

            RelayErrorKind::Configuration => ErrorKind::InternalServerError
                .with_message("Relay is misconfigured")
                .with_context(context),

            RelayErrorKind::ConsumerProcessing | RelayErrorKind::Subscription => {
                ErrorKind::InternalServerError
                    .with_message("Queue consumer failed")
                    .with_context(context)
            }
        }
    }
}
