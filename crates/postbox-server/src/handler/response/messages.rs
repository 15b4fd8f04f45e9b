//! Message response types.

use postbox_core::Message;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response returned after a message was accepted.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageCreated {
    /// Identifier assigned by the relay.
    pub uuid: Uuid,
}

/// Stored message.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    /// Identifier of the message.
    pub uuid: Uuid,
    /// Message content.
    pub content: String,
}

impl From<Message> for MessageContent {
    fn from(message: Message) -> Self {
        Self {
            uuid: message.uuid,
            content: message.content,
        }
    }
}
