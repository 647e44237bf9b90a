//! Shared application state and HTTP router assembly.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    handlers, middleware,
    services::{
        credential_files::CredentialFiles,
        credential_store::{CredentialStore, JsonFileBackend},
        env_file::EnvFile,
        sql_importer::PgScriptImporter,
        token_issuer::TokenIssuer,
        upload_pipeline::{UploadDirs, UploadPipeline},
    },
};

/// State shared with every handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CredentialStore>,
    pub tokens: Arc<TokenIssuer>,
    pub uploads: UploadPipeline,
    /// Require the owner's `X-API-KEY` on credential downloads
    pub download_requires_api_key: bool,
}

impl AppState {
    /// Production wiring: JSON credential file, `.env` mirror, PostgreSQL importer.
    ///
    /// Also creates the upload folders and imports `API_KEY_<username>`
    /// variables from the process environment.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = CredentialStore::new(
            JsonFileBackend::new(&config.api_key_file),
            CredentialFiles::new(&config.credentials_dir),
        )
        .with_env_file(EnvFile::new(&config.env_file));
        store.import_env_keys(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )?;

        let dirs = UploadDirs::from_config(config);
        dirs.create_all()?;
        let importer = PgScriptImporter::new(config.database_url()?);

        Ok(Self {
            store: Arc::new(store),
            tokens: Arc::new(TokenIssuer::new(&config.jwt_secret, config.jwt_ttl_seconds)),
            uploads: UploadPipeline::new(dirs, Arc::new(importer)),
            download_requires_api_key: config.download_requires_api_key,
        })
    }
}

/// Build the HTTP router.
///
/// # Routes
///
/// - `GET  /health`
/// - `POST /api/create_api_user`
/// - `GET  /api/verify_key`
/// - `POST /api/verify_token`
/// - `GET  /api/download_token/{username}`
/// - `GET  /api/download_api_key/{username}`
/// - `POST /api/upload_csv` (API key required)
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let authenticated_routes = Router::new()
        .route("/api/upload_csv", post(handlers::uploads::upload_csv))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/create_api_user", post(handlers::users::create_api_user))
        .route("/api/verify_key", get(handlers::verification::verify_key))
        .route("/api/verify_token", post(handlers::verification::verify_token))
        .route(
            "/api/download_token/{username}",
            get(handlers::downloads::download_token),
        )
        .route(
            "/api/download_api_key/{username}",
            get(handlers::downloads::download_api_key),
        )
        .merge(authenticated_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
