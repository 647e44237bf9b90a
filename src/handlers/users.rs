//! User registration handler.
//!
//! - POST /api/create_api_user - Register a user, returning API key and token

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    app::AppState,
    error::AppError,
    models::user::{CreateUserRequest, CreateUserResponse},
};

/// Register a new API user.
///
/// # Endpoint
///
/// `POST /api/create_api_user`
///
/// # Request Body
///
/// ```json
/// { "username": "bob", "password": "pw1" }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: `{"api_key": "<64 hex>", "jwt_token": "<jwt>"}`
/// - **Error (400)**: missing fields, invalid username, or already registered
///   (the duplicate response carries the existing `api_key`)
/// - **Error (500)**: credential file could not be written
pub async fn create_api_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let username = request
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let password = request.password.as_deref().filter(|p| !p.is_empty());

    let (username, password) = match (username, password) {
        (Some(username), Some(password)) => (username, password),
        (None, Some(_)) => return Err(AppError::InvalidRequest("username is required".into())),
        (Some(_), None) => return Err(AppError::InvalidRequest("password is required".into())),
        (None, None) => {
            return Err(AppError::InvalidRequest(
                "username and password are required".into(),
            ));
        }
    };

    let record = state.store.create_user(username, password, &state.tokens)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            api_key: record.api_key,
            jwt_token: record.jwt_token,
        }),
    ))
}
