//! Request tracing and request-id middleware.

use axum::Router;
use axum::http::header;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

/// Header carrying the request identifier.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extension trait for `axum::`[`Router`] to apply observability middleware.
pub trait RouterObservabilityExt<S> {
    /// Layers request tracing and request-id middleware.
    ///
    /// Every request gets an `x-request-id` (kept if the client sent one), which
    /// is echoed on the response. Credentials headers are redacted from logs.
    fn with_observability(self) -> Self;
}

impl<S> RouterObservabilityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_observability(self) -> Self {
        self.layer(PropagateRequestIdLayer::new(
            header::HeaderName::from_static(REQUEST_ID_HEADER),
        ))
        .layer(SetSensitiveRequestHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(
            header::HeaderName::from_static(REQUEST_ID_HEADER),
            MakeRequestUuid,
        ))
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use axum_test::TestServer;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .with_observability()
    }

    #[tokio::test]
    async fn request_id_is_generated() -> anyhow::Result<()> {
        let server = TestServer::new(app())?;

        let response = server.get("/ping").await;
        response.assert_status_ok();

        let request_id = response.header(REQUEST_ID_HEADER);
        assert!(uuid::Uuid::parse_str(request_id.to_str()?).is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn request_id_is_propagated() -> anyhow::Result<()> {
        let server = TestServer::new(app())?;

        let response = server
            .get("/ping")
            .add_header(REQUEST_ID_HEADER, "client-supplied")
            .await;

        assert_eq!(response.header(REQUEST_ID_HEADER), "client-supplied");
        Ok(())
    }
}
