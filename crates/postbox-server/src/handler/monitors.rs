//! Relay health handlers.

use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use axum::http::StatusCode;
use postbox_core::{MessageRelay, ServiceStatus};

use crate::extract::Json;
use crate::handler::{ErrorKind, Result};
use crate::handler::response::MonitorStatus;
use crate::service::ServiceState;

/// Tracing target for monitor operations.
const TRACING_TARGET: &str = "postbox_server::handler::monitors";

/// Reports the combined health of the queue and the object store.
#[tracing::instrument(skip_all)]
async fn health_status(
    State(relay): State<MessageRelay>,
) -> Result<(StatusCode, Json<MonitorStatus>)> {
    let health = relay.health_check().await;

    let status_code = match health.status {
        ServiceStatus::Unhealthy => ErrorKind::ServiceUnavailable.status_code(),
        ServiceStatus::Healthy | ServiceStatus::Degraded => StatusCode::OK,
    };

    tracing::debug!(
        target: TRACING_TARGET,
        status = ?health.status,
        detail = health.message.as_deref(),
        status_code = status_code.as_u16(),
        "Health status checked",
    );

    let response = MonitorStatus {
        status: health.status,
        mode: relay.mode(),
        checked_at: health.checked_at,
    };

    Ok((status_code, Json(response)))
}

fn health_status_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Get relay health")
        .description(
            "Checks the queue and the object store. Responds with 503 when either \
             backend is unhealthy.",
        )
        .response::<200, Json<MonitorStatus>>()
        .response::<503, Json<MonitorStatus>>()
}

/// Returns a [`Router`] with all health monitoring routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> ApiRouter<ServiceState> {
    use aide::axum::routing::*;

    ApiRouter::new()
        .api_route("/api/health", get_with(health_status, health_status_docs))
        .with_path_items(|item| item.tag("Health"))
}
