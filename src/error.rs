//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::services::{
    credential_store::StoreError, csv_converter::ConvertError, token_issuer::TokenError,
};

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
///
/// # Error Categories
///
/// - **Validation**: missing fields, missing CSV columns, bad input
/// - **Duplicate**: username already registered
/// - **Authentication**: bad or missing API key or token
/// - **Not Found**: unknown user or credential file
/// - **Storage**: file or database failure
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// CSV header lacks required columns.
    ///
    /// Returns HTTP 400 Bad Request with the column list.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Username already registered. The existing key is echoed back.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("User {username} is already registered")]
    DuplicateUser { username: String, api_key: String },

    /// API key is missing or unknown.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// `Authorization` header missing or not of the form `Bearer <token>`.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    MalformedAuthHeader(String),

    /// Token failed signature or expiry checks.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error(transparent)]
    InvalidToken(TokenError),

    /// Returns HTTP 404 Not Found.
    #[error("{0}")]
    NotFound(String),

    /// File or database failure. Details are logged, not returned.
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// `duplicate_user` additionally carries a top-level `api_key`, and
/// `missing_columns` carries `error.columns`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::MissingColumns(_) => (StatusCode::BAD_REQUEST, "missing_columns"),
            AppError::DuplicateUser { .. } => (StatusCode::BAD_REQUEST, "duplicate_user"),
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key"),
            AppError::MalformedAuthHeader(_) => {
                (StatusCode::BAD_REQUEST, "malformed_authorization")
            }
            AppError::InvalidToken(TokenError::Expired) => {
                (StatusCode::UNAUTHORIZED, "token_expired")
            }
            AppError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };

        let message = match &self {
            AppError::Storage(detail) => {
                tracing::error!(detail = %detail, "storage failure");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut error = json!({ "code": code, "message": message });
        if let AppError::MissingColumns(columns) = &self {
            error["columns"] = json!(columns);
        }

        let mut body = json!({ "error": error });
        if let AppError::DuplicateUser { api_key, .. } = self {
            body["api_key"] = Value::String(api_key);
        }

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUser { username, api_key } => {
                AppError::DuplicateUser { username, api_key }
            }
            StoreError::InvalidUsername(msg) => AppError::InvalidRequest(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<ConvertError> for AppError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::MissingColumns(columns) => AppError::MissingColumns(columns),
            e @ (ConvertError::InvalidNumber { .. } | ConvertError::Csv(_)) => {
                AppError::InvalidRequest(e.to_string())
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AppError::Storage(msg),
            other => AppError::InvalidToken(other),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn duplicate_user_echoes_existing_key() {
        let (status, body) = body_of(AppError::DuplicateUser {
            username: "alice".into(),
            api_key: "abc".into(),
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "duplicate_user");
        assert_eq!(body["api_key"], "abc");
    }

    #[tokio::test]
    async fn storage_details_are_hidden() {
        let (status, body) = body_of(AppError::Storage("/secret/path: denied".into())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn token_errors_distinguish_expiry() {
        let (status, body) = body_of(TokenError::Expired.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "token_expired");

        let (_, body) = body_of(TokenError::Invalid.into()).await;
        assert_eq!(body["error"]["code"], "invalid_token");
    }

    #[tokio::test]
    async fn missing_columns_are_listed() {
        let (status, body) = body_of(AppError::MissingColumns(vec!["phone".into()])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["columns"], json!(["phone"]));
    }
}
