//! Monitor response types.

use jiff::Timestamp;
use postbox_core::{RelayMode, ServiceStatus};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Aggregated relay health.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    /// Worst status reported by the queue and the object store.
    pub status: ServiceStatus,
    /// Relay mode of this deployment.
    pub mode: RelayMode,
    /// Timestamp when this status was generated.
    pub checked_at: Timestamp,
}
