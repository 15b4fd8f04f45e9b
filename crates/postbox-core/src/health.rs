//! Health reporting for relay backends.

use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Operational status of a backend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum ServiceStatus {
    /// Backend is operating normally
    #[default]
    Healthy,
    /// Backend is reachable but reports issues
    Degraded,
    /// Backend is not operational
    Unhealthy,
}

/// Health information for a backend.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// Current status
    pub status: ServiceStatus,
    /// Time taken by the health check
    pub response: Option<Duration>,
    /// Optional message describing the current state
    pub message: Option<String>,
    /// When the health check was performed
    pub checked_at: Timestamp,
}

impl ServiceHealth {
    /// Creates a new healthy report.
    pub fn healthy() -> Self {
        Self {
            status: ServiceStatus::Healthy,
            checked_at: Timestamp::now(),
            ..Default::default()
        }
    }

    /// Creates a new degraded report.
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: ServiceStatus::Degraded,
            message: Some(message.into()),
            checked_at: Timestamp::now(),
            ..Default::default()
        }
    }

    /// Creates a new unhealthy report.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: ServiceStatus::Unhealthy,
            message: Some(message.into()),
            checked_at: Timestamp::now(),
            ..Default::default()
        }
    }

    /// Sets the response time for this health check.
    pub fn with_response_time(mut self, response_time: Duration) -> Self {
        self.response = Some(response_time);
        self
    }

    /// Combines two reports, keeping the worse status.
    ///
    /// Messages are joined with `"; "` and response times are summed.
    pub fn combine(self, other: Self) -> Self {
        let status = self.status.max(other.status);
        let message = match (self.message, other.message) {
            (Some(a), Some(b)) => Some(format!("{a}; {b}")),
            (a, b) => a.or(b),
        };
        let response = match (self.response, other.response) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };

        Self {
            status,
            response,
            message,
            checked_at: self.checked_at.max(other.checked_at),
        }
    }
}
