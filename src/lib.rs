//! CSV Key Gateway
//!
//! A REST API that registers users, issues them API keys and JWTs, and
//! imports uploaded review CSVs into PostgreSQL.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Credentials**: JSON file store, HS256 JWTs via `jsonwebtoken`
//! - **Imports**: CSV → SQL script → one PostgreSQL transaction via sqlx
//! - **Format**: JSON requests/responses, plain-text credential downloads

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use tracing_subscriber::EnvFilter;

/// Initialize logging with tracing subscriber.
///
/// Reads `RUST_LOG`; without it the level is `info`, or `debug` when `debug` is set.
pub fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .init();
}
