//! Health check endpoint for service monitoring.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
///
/// Returns service status plus credential store and database reachability.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Credential file status
    pub credential_store: String,

    /// Database connection status
    pub database: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Checks
///
/// - Credential file can be read and parsed
/// - Database accepts a connection (executes simple query)
///
/// # Response
///
/// 200 with `"status": "healthy"` when both checks pass, otherwise 503 with
/// `"status": "degraded"`.
///
/// ```json
/// {
///   "status": "healthy",
///   "credential_store": "ok",
///   "database": "connected",
///   "timestamp": "2026-10-16T10:00:00Z"
/// }
/// ```
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = match state.store.load() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "credential store unhealthy");
            false
        }
    };
    let database_ok = match state.uploads.importer().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "database unreachable");
            false
        }
    };

    let healthy = store_ok && database_ok;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            credential_store: if store_ok { "ok" } else { "unavailable" }.to_string(),
            database: if database_ok { "connected" } else { "unreachable" }.to_string(),
            timestamp: Utc::now(),
        }),
    )
}
