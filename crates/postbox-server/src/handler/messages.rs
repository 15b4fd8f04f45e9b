//! Message publishing and retrieval handlers.

use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use postbox_core::MessageRelay;

use crate::extract::{Json, Path};
use crate::handler::Result;
use crate::handler::request::{CreateMessage, MessagePathParams};
use crate::handler::response::{ErrorResponse, MessageContent, MessageCreated};
use crate::service::ServiceState;

/// Tracing target for message operations.
const TRACING_TARGET: &str = "postbox_server::handler::messages";

/// Publishes a message and returns its identifier.
///
/// In direct mode the content is stored before the response is sent; in
/// delegated mode the queue consumer stores it later.
#[tracing::instrument(skip_all, fields(mode = %relay.mode()))]
async fn create_message(
    State(relay): State<MessageRelay>,
    Json(request): Json<CreateMessage>,
) -> Result<Json<MessageCreated>> {
    tracing::debug!(
        target: TRACING_TARGET,
        size = request.content.len(),
        "Publishing message",
    );

    let uuid = relay.create(request.content).await?;

    tracing::info!(
        target: TRACING_TARGET,
        uuid = %uuid,
        "Message published",
    );

    Ok(Json(MessageCreated { uuid }))
}

fn create_message_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Publish message")
        .description(
            "Publishes the message to the queue and returns the identifier assigned by the \
             relay. In direct mode the content is also stored before responding.",
        )
        .response::<200, Json<MessageCreated>>()
        .response::<400, Json<ErrorResponse<'static>>>()
        .response::<500, Json<ErrorResponse<'static>>>()
}

/// Returns the stored content of a message.
#[tracing::instrument(skip_all, fields(uuid = %path_params.uuid))]
async fn get_message(
    State(relay): State<MessageRelay>,
    Path(path_params): Path<MessagePathParams>,
) -> Result<Json<MessageContent>> {
    tracing::debug!(target: TRACING_TARGET, "Reading message");

    let message = relay.get(path_params.uuid).await?;

    tracing::debug!(
        target: TRACING_TARGET,
        size = message.content.len(),
        "Message read",
    );

    Ok(Json(message.into()))
}

fn get_message_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Get message")
        .description(
            "Returns the stored content of a message. Responds with 404 while a message \
             published in delegated mode has not been processed yet.",
        )
        .response::<200, Json<MessageContent>>()
        .response::<400, Json<ErrorResponse<'static>>>()
        .response::<404, Json<ErrorResponse<'static>>>()
}

/// Returns a [`Router`] with all message routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> ApiRouter<ServiceState> {
    use aide::axum::routing::*;

    ApiRouter::new()
        .api_route("/api/messages", post_with(create_message, create_message_docs))
        .api_route("/api/messages/{uuid}", get_with(get_message, get_message_docs))
        .with_path_items(|item| item.tag("Messages"))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use postbox_core::RelayMode;
    use postbox_test::EphemeralEnvironment;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::handler::test::create_test_server;

    #[tokio::test]
    async fn direct_round_trip() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let server = create_test_server(&env, RelayMode::Direct)?;

        let response = server
            .post("/api/messages")
            .json(&json!({ "content": "hello, postbox" }))
            .await;
        response.assert_status_ok();
        let created = response.json::<MessageCreated>();

        let response = server.get(&format!("/api/messages/{}", created.uuid)).await;
        response.assert_status_ok();
        let message = response.json::<MessageContent>();

        assert_eq!(message.uuid, created.uuid);
        assert_eq!(message.content, "hello, postbox");
        assert_eq!(env.storage().upload_calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn client_uuid_is_ignored() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let server = create_test_server(&env, RelayMode::Direct)?;
        let client_uuid = Uuid::new_v4();

        let response = server
            .post("/api/messages")
            .json(&json!({ "uuid": client_uuid, "content": "mine" }))
            .await;
        response.assert_status_ok();
        let created = response.json::<MessageCreated>();
        assert_ne!(created.uuid, client_uuid);

        let response = server.get(&format!("/api/messages/{client_uuid}")).await;
        response.assert_status_not_found();
        Ok(())
    }

    #[tokio::test]
    async fn delegated_message_appears_after_consumer() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let server = create_test_server(&env, RelayMode::Delegated)?;

        let response = server
            .post("/api/messages")
            .json(&json!({ "content": "later" }))
            .await;
        response.assert_status_ok();
        let created = response.json::<MessageCreated>();
        assert_eq!(env.storage().upload_calls(), 0);

        let path = format!("/api/messages/{}", created.uuid);
        server.get(&path).await.assert_status_not_found();

        assert_eq!(env.drain().await?, 1);

        let response = server.get(&path).await;
        response.assert_status_ok();
        assert_eq!(response.json::<MessageContent>().content, "later");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_uuid_is_not_found() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let server = create_test_server(&env, RelayMode::Direct)?;

        let response = server
            .get(&format!("/api/messages/{}", Uuid::new_v4()))
            .await;
        response.assert_status_not_found();

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["name"], "not_found");
        assert_eq!(body["resource"], "message");
        Ok(())
    }

    #[tokio::test]
    async fn malformed_uuid_is_bad_request() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let server = create_test_server(&env, RelayMode::Direct)?;

        let response = server.get("/api/messages/not-a-uuid").await;
        response.assert_status_bad_request();

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["name"], "bad_request");
        assert_eq!(env.storage().download_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn publish_failure_skips_upload() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        env.queue().set_fail_publish(true);
        let server = create_test_server(&env, RelayMode::Direct)?;

        let response = server
            .post("/api/messages")
            .json(&json!({ "content": "dropped" }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["resource"], "queue");
        assert_eq!(env.storage().upload_calls(), 0);
        assert_eq!(env.storage().object_count(env.bucket_name()).await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn upload_failure_is_server_error() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        env.storage().set_fail_upload(true);
        let server = create_test_server(&env, RelayMode::Direct)?;

        let response = server
            .post("/api/messages")
            .json(&json!({ "content": "half done" }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["resource"], "bucket");
        assert_eq!(env.queue().published(env.queue_name()).await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let server = create_test_server(&env, RelayMode::Direct)?;

        let response = server
            .post("/api/messages")
            .bytes("{oops".into())
            .content_type("application/json")
            .await;
        response.assert_status_bad_request();
        assert!(env.queue().published(env.queue_name()).await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_content_is_bad_request() -> anyhow::Result<()> {
        let env = EphemeralEnvironment::new();
        let server = create_test_server(&env, RelayMode::Direct)?;

        let response = server
            .post("/api/messages")
            .json(&json!({ "body": "wrong field" }))
            .await;
        response.assert_status_bad_request();
        Ok(())
    }
}
