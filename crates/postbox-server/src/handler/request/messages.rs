//! Message request types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request payload for publishing a message.
///
/// Unknown fields are ignored; identifiers are always assigned by the relay.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessage {
    /// Message content.
    pub content: String,
}

/// Path parameters for message retrieval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagePathParams {
    /// Identifier returned when the message was published.
    pub uuid: Uuid,
}
