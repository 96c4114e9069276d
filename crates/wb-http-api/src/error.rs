//! API error type rendering the `{action, status, error}` envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// A failed operation: unknown assembly, bad token, no active session.
/// Renders as HTTP 400 with the action that failed.
#[derive(Debug, thiserror::Error)]
#[error("{action}: {message}")]
pub struct ApiError {
    pub action: String,
    pub message: String,
}

impl ApiError {
    pub fn new(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "action": self.action,
            "status": "error",
            "error": self.message,
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn renders_error_envelope() {
        let err = ApiError::new("get_temp", "unknown assembly 'kettle_9'");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["action"], "get_temp");
        assert_eq!(json["status"], "error");
        assert!(json["error"].as_str().unwrap().contains("kettle_9"));
    }
}
