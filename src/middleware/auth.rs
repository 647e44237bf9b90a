//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the `API-Key` (or `X-API-KEY`) header
//! 2. Look it up in the credential store
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::{app::AppState, error::AppError, services::token_issuer::fingerprint};

/// Header carrying the key on upload requests.
pub const UPLOAD_KEY_HEADER: &str = "API-Key";

/// Header carrying the key on verification and download requests.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Authentication context attached to authenticated requests.
///
/// Route handlers extract it with `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Owner of the presented API key
    pub username: String,
}

/// First non-empty value among `names`. Header names match case-insensitively.
pub fn header_value<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Read `API-Key: <key>` (falling back to `X-API-KEY`)
/// 2. Scan the credential store for a user owning that key
/// 3. If found: inject `AuthContext` into request, call next handler
/// 4. If not found: return 401 Unauthorized error
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = header_value(request.headers(), &[UPLOAD_KEY_HEADER, API_KEY_HEADER])
        .ok_or(AppError::InvalidApiKey)?
        .to_string();

    let username = state
        .store
        .find_by_api_key(&api_key)?
        .ok_or_else(|| {
            tracing::warn!(key = %fingerprint(&api_key), "rejected unknown API key");
            AppError::InvalidApiKey
        })?;

    request.extensions_mut().insert(AuthContext { username });

    Ok(next.run(request).await)
}
