//! All `aide::`[`ApiRouter`]s with related `axum::`[`Handler`]s.
//!
//! [`ApiRouter`]: aide::axum::ApiRouter
//! [`Handler`]: axum::handler::Handler

mod error;
mod messages;
mod monitors;
pub mod request;
pub mod response;

use aide::axum::ApiRouter;
use axum::Router;
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
use crate::middleware::{OpenApiConfig, RouterOpenApiExt};
use crate::service::ServiceState;

#[inline]
async fn fallback() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns an [`ApiRouter`] with all relay routes.
pub fn routes() -> ApiRouter<ServiceState> {
    ApiRouter::new()
        .merge(messages::routes())
        .merge(monitors::routes())
}

/// Returns the complete application [`Router`].
///
/// Serves the relay routes together with the OpenAPI document and the Scalar UI;
/// every other path answers with a `404` error body.
pub fn router(state: ServiceState, open_api: OpenApiConfig) -> Router {
    routes()
        .with_open_api(open_api)
        .fallback(fallback)
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::Arc;

    use axum_test::TestServer;
    use postbox_core::RelayMode;
    use postbox_test::EphemeralEnvironment;

    use crate::handler::router;
    use crate::middleware::OpenApiConfig;
    use crate::service::ServiceState;

    /// Returns a [`ServiceState`] over the environment's in-memory backends.
    pub fn create_test_state(env: &EphemeralEnvironment, mode: RelayMode) -> ServiceState {
        ServiceState::new(
            env.config(mode),
            env.queue().clone(),
            Arc::new(env.storage().clone()),
        )
    }

    /// Returns a new [`TestServer`] with the default router.
    pub fn create_test_server(
        env: &EphemeralEnvironment,
        mode: RelayMode,
    ) -> anyhow::Result<TestServer> {
        let state = create_test_state(env, mode);
        let app = router(state, OpenApiConfig::default());
        let server = TestServer::new(app)?;
        Ok(server)
    }

    #[tokio::test]
    async fn handlers() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let server = create_test_server(&env, RelayMode::Direct)?;
        assert!(server.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let server = create_test_server(&env, RelayMode::Direct)?;

        let response = server.get("/api/unknown").await;
        response.assert_status_not_found();

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["name"], "not_found");
        Ok(())
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let server = create_test_server(&env, RelayMode::Direct)?;

        let response = server.get("/api/openapi.json").await;
        response.assert_status_ok();

        let document = response.json::<serde_json::Value>();
        assert!(document["paths"]["/api/messages"].is_object());
        assert!(document["paths"]["/api/messages/{uuid}"].is_object());
        assert!(document["paths"]["/api/health"].is_object());
        Ok(())
    }
}
