//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use url::Url;

/// Longest accepted token lifetime (one year).
pub const MAX_JWT_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Errors raised while loading or interpreting configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("JWT_SECRET must not be empty")]
    EmptyJwtSecret,

    #[error("JWT_TTL_SECONDS must be between 1 and {MAX_JWT_TTL_SECONDS}, got {0}")]
    JwtTtl(i64),

    #[error("invalid database settings: {0}")]
    Database(String),
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `JWT_SECRET` (required): shared HS256 secret
/// - `HOST` / `PORT` (optional): bind address, defaults to `0.0.0.0:5000`
/// - `DEBUG` (optional): accepts `true`, `True`, `1` or `yes`
/// - `DATABASE_URL` (optional): full PostgreSQL URL; when absent the URL is
///   assembled from `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD` and `DB_NAME`
/// - `API_KEY_FILE`, `ENV_FILE`, `CREDENTIALS_DIR`: credential persistence
/// - `UPLOAD_CSV_DIR`, `UPLOAD_SQL_DIR`, `PROCESSED_CSV_DIR`: upload pipeline folders
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default, deserialize_with = "flag")]
    pub debug: bool,

    pub jwt_secret: String,

    #[serde(default = "default_jwt_ttl")]
    pub jwt_ttl_seconds: i64,

    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_db_host")]
    pub db_host: String,

    #[serde(default = "default_db_port")]
    pub db_port: u16,

    #[serde(default = "default_db_user")]
    pub db_user: String,

    #[serde(default)]
    pub db_password: String,

    #[serde(default = "default_db_name")]
    pub db_name: String,

    #[serde(default = "default_api_key_file")]
    pub api_key_file: PathBuf,

    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    #[serde(default = "default_credentials_dir")]
    pub credentials_dir: PathBuf,

    #[serde(default = "default_upload_csv_dir")]
    pub upload_csv_dir: PathBuf,

    #[serde(default = "default_upload_sql_dir")]
    pub upload_sql_dir: PathBuf,

    #[serde(default = "default_processed_csv_dir")]
    pub processed_csv_dir: PathBuf,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// When set, downloads require the owner's API key in `X-API-KEY`.
    #[serde(default, deserialize_with = "flag")]
    pub download_requires_api_key: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_jwt_ttl() -> i64 {
    3600
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_name() -> String {
    "csv_database".to_string()
}

fn default_api_key_file() -> PathBuf {
    PathBuf::from("api_keys.json")
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

fn default_credentials_dir() -> PathBuf {
    PathBuf::from("credentials")
}

fn default_upload_csv_dir() -> PathBuf {
    PathBuf::from("upload_csv")
}

fn default_upload_sql_dir() -> PathBuf {
    PathBuf::from("upload_sql")
}

fn default_processed_csv_dir() -> PathBuf {
    PathBuf::from("processed_csv")
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

/// Lenient boolean: `true`, `True`, `1`, `yes` and `on` all count as set.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    ))
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `JWT_SECRET` is missing or empty
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: jwt_secret -> JWT_SECRET
        let config = envy::from_env::<Config>()?;
        config.validate()
    }

    /// Build a configuration from explicit key/value pairs instead of the process environment.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Config>(pairs)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::EmptyJwtSecret);
        }
        if !(1..=MAX_JWT_TTL_SECONDS).contains(&self.jwt_ttl_seconds) {
            return Err(ConfigError::JwtTtl(self.jwt_ttl_seconds));
        }
        Ok(self)
    }

    /// Socket address string the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// PostgreSQL connection URL.
    ///
    /// `DATABASE_URL` wins when present. Otherwise the discrete `DB_*`
    /// settings are assembled with proper percent-encoding of the credentials.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(url.to_string());
        }

        let mut url = Url::parse(&format!("postgres://{}", self.db_host))
            .map_err(|e| ConfigError::Database(e.to_string()))?;
        url.set_port(Some(self.db_port))
            .map_err(|_| ConfigError::Database("port cannot be set on this URL".to_string()))?;
        url.set_username(&self.db_user)
            .map_err(|_| ConfigError::Database("username cannot be set on this URL".to_string()))?;
        if !self.db_password.is_empty() {
            url.set_password(Some(&self.db_password))
                .map_err(|_| ConfigError::Database("password cannot be set on this URL".to_string()))?;
        }
        url.set_path(&self.db_name);

        Ok(url.to_string())
    }
}
