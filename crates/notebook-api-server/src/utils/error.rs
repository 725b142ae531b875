use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::conversation::ManagerError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Generation failed: {message}")]
    GenerationFailed {
        chat_id: String,
        user_turn_saved: bool,
        message: String,
    },

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_turn_saved: Option<bool>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut chat = None;
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", msg)
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::Conflict(msg) => {
                tracing::warn!("Conflict: {}", msg);
                (StatusCode::CONFLICT, "Conflict", msg)
            }
            ApiError::PayloadTooLarge(msg) => {
                tracing::warn!("Payload too large: {}", msg);
                (StatusCode::PAYLOAD_TOO_LARGE, "PayloadTooLarge", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable", msg)
            }
            ApiError::GenerationFailed {
                chat_id,
                user_turn_saved,
                message,
            } => {
                tracing::error!(chat_id = %chat_id, "Generation failed: {}", message);
                chat = Some((chat_id, user_turn_saved));
                (StatusCode::SERVICE_UNAVAILABLE, "GenerationFailed", message)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg)
            }
        };

        let (chat_id, user_turn_saved) = match chat {
            Some((id, saved)) => (Some(id), Some(saved)),
            None => (None, None),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            chat_id,
            user_turn_saved,
        });

        (status, body).into_response()
    }
}

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::InvalidRole(_) => ApiError::BadRequest(err.to_string()),
            ManagerError::NothingToResume(_) => ApiError::Conflict(err.to_string()),
            ManagerError::GenerationFailed {
                chat_id,
                user_turn_saved,
                reason,
            } => ApiError::GenerationFailed {
                chat_id,
                user_turn_saved,
                message: reason,
            },
            ManagerError::RetrievalUnavailable(_) => ApiError::ServiceUnavailable(err.to_string()),
            // Never escapes the manager; treat as a server bug if it does
            ManagerError::ScopeViolation(_) | ManagerError::Storage(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_generation_failure_body() {
        let err: ApiError = ManagerError::GenerationFailed {
            chat_id: "c1".to_string(),
            user_turn_saved: true,
            reason: "timeout".to_string(),
        }
        .into();

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(body["error"], "GenerationFailed");
        assert_eq!(body["chat_id"], "c1");
        assert_eq!(body["user_turn_saved"], true);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (ManagerError::InvalidRole("x".into()), StatusCode::BAD_REQUEST),
            (ManagerError::NothingToResume("c1".into()), StatusCode::CONFLICT),
            (ManagerError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ManagerError::RetrievalUnavailable("down".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }

        let body = body_json(ApiError::NotFound("nb".into()).into_response()).await;
        assert!(body.get("chat_id").is_none());
    }
}
