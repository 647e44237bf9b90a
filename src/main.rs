//! CSV Key Gateway - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables (and `.env`)
//! 2. Initialize logging
//! 3. Open the credential store and import `API_KEY_*` variables
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured address

use csv_key_gateway::{app, config::Config, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.debug);
    tracing::info!("Configuration loaded");

    let state = app::AppState::from_config(&config)?;
    tracing::info!(file = %config.api_key_file.display(), "Credential store ready");

    if !config.download_requires_api_key {
        tracing::warn!(
            "Credential downloads are unauthenticated; set DOWNLOAD_REQUIRES_API_KEY=true to require the owner's API key"
        );
    }

    let app = app::router(state, config.max_upload_bytes);

    // Bind to network address and start server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
