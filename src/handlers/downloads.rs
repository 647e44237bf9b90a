//! Credential file downloads.
//!
//! - GET /api/download_token/{username}
//! - GET /api/download_api_key/{username}
//!
//! # Security Note
//!
//! By default anyone who knows a username can fetch that user's key and
//! token. Setting `DOWNLOAD_REQUIRES_API_KEY=true` limits downloads to
//! callers presenting the owner's key in `X-API-KEY`.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};

use crate::{
    app::AppState,
    error::AppError,
    middleware::auth::{API_KEY_HEADER, header_value},
    models::user::validate_username,
    services::credential_files::CredentialKind,
};

pub async fn download_token(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    serve_credential(&state, &headers, &username, CredentialKind::Token)
}

pub async fn download_api_key(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    serve_credential(&state, &headers, &username, CredentialKind::ApiKey)
}

fn serve_credential(
    state: &AppState,
    headers: &HeaderMap,
    username: &str,
    kind: CredentialKind,
) -> Result<Response, AppError> {
    // Names that could never be registered cannot have files either.
    if validate_username(username).is_err() {
        return Err(AppError::NotFound(format!("No credentials for {username}")));
    }

    if state.download_requires_api_key {
        let owner = match header_value(headers, &[API_KEY_HEADER]) {
            Some(key) => state.store.find_by_api_key(key)?,
            None => None,
        };
        if owner.as_deref() != Some(username) {
            return Err(AppError::InvalidApiKey);
        }
    }

    let bytes = state
        .store
        .files()
        .read(kind, username)?
        .ok_or_else(|| AppError::NotFound(format!("No credentials for {username}")))?;

    tracing::info!(username, file = %kind.file_name(username), "credential file downloaded");

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", kind.file_name(username)),
            ),
        ],
        bytes,
    )
        .into_response())
}
