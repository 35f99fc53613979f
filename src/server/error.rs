//! HTTP error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CalmError;

/// `{"error": {...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed request body or missing `$schema` (400)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// `$schema` names a schema that is not loaded (400)
    #[error("unknown schema: {id}")]
    UnknownSchema { id: String, suggestions: Vec<String> },

    /// Anything else; the message is logged, not returned (500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::UnknownSchema { .. } => (StatusCode::BAD_REQUEST, "UNKNOWN_SCHEMA"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<CalmError> for AppError {
    fn from(err: CalmError) -> Self {
        match err {
            CalmError::SchemaNotFound { id, suggestions } => Self::UnknownSchema { id, suggestions },
            CalmError::Parse { reason, .. } => Self::BadRequest(format!("body is not valid JSON: {reason}")),
            CalmError::InvalidOptions(message) | CalmError::InvalidPattern(message) => {
                Self::BadRequest(message)
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let (message, details) = match &self {
            Self::Internal(_) => {
                tracing::error!(error = %self, "validation request failed");
                ("An internal error occurred".to_string(), None)
            }
            Self::UnknownSchema { suggestions, .. } if !suggestions.is_empty() => (
                self.to_string(),
                Some(serde_json::json!({ "suggestions": suggestions })),
            ),
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn test_unknown_schema_carries_suggestions() {
        let err = AppError::from(CalmError::SchemaNotFound {
            id: "https://x/patern.json".to_string(),
            suggestions: vec!["https://x/pattern.json".to_string()],
        });
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.code, "UNKNOWN_SCHEMA");
        assert_eq!(
            body.error.details.unwrap()["suggestions"][0],
            "https://x/pattern.json"
        );
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let err = AppError::from(CalmError::Compile {
            schema_id: "secret".to_string(),
            reason: "stack trace".to_string(),
        });
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.message.contains("secret"));
    }
}
