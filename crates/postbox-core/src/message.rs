//! The relayed message.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work: a random identifier paired with free-form content.
///
/// The serialized form `{"uuid": "...", "content": "..."}` is the queue payload.
/// The object store holds only `content`, keyed by the canonical string form of `uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Message {
    /// Unique identifier, also the object key in storage.
    pub uuid: Uuid,
    /// Arbitrary message content. Empty content is permitted.
    pub content: String,
}

impl Message {
    /// Creates a new message with a freshly generated random (v4) identifier.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            content: content.into(),
        }
    }

    /// Creates a message with an explicit identifier.
    pub fn with_uuid(uuid: Uuid, content: impl Into<String>) -> Self {
        Self {
            uuid,
            content: content.into(),
        }
    }

    /// Returns the storage key for this message.
    pub fn key(&self) -> String {
        self.uuid.to_string()
    }

    /// Serializes the message into JSON bytes.
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses a message from its JSON document.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn new_generates_v4_identifiers() {
        let first = Message::new("hello");
        let second = Message::new("hello");
        assert_ne!(first.uuid, second.uuid);
        assert_eq!(first.uuid.get_version_num(), 4);
    }

    #[test]
    fn json_document_shape() {
        let uuid = Uuid::parse_str("2f1e4d0a-9b1c-4e7b-8a55-0d6a3c1f2b3e").unwrap();
        let message = Message::with_uuid(uuid, "hi");
        let value: serde_json::Value = serde_json::from_slice(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "uuid": "2f1e4d0a-9b1c-4e7b-8a55-0d6a3c1f2b3e",
                "content": "hi",
            })
        );
        assert_eq!(message.key(), "2f1e4d0a-9b1c-4e7b-8a55-0d6a3c1f2b3e");
    }

    #[test]
    fn empty_content_is_allowed() {
        let message = Message::new("");
        let parsed = Message::from_slice(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn malformed_payload_is_serialization_error() {
        let error = Message::from_slice(b"{\"content\": 1}").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Serialization);
    }
}
