//! Registered user model and registration request/response types.
//!
//! Users live in the credential file as a JSON object keyed by username:
//!
//! ```json
//! {
//!     "alice": {
//!         "api_key": "9f86d0...",
//!         "password": "pw1",
//!         "jwt_token": "eyJ0eXAiOiJKV1Qi..."
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 64;

/// Username → record, ordered so the credential file diffs cleanly.
pub type CredentialMap = BTreeMap<String, UserRecord>;

/// One registered user.
///
/// # Security Note
///
/// `password` is stored exactly as submitted. Nothing in the service reads
/// it back; it is kept so the on-disk format stays compatible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// 64 lowercase hex characters (32 random bytes)
    pub api_key: String,

    #[serde(default)]
    pub password: String,

    /// Last token issued at registration time
    #[serde(default)]
    pub jwt_token: String,
}

impl UserRecord {
    /// Record for a user known only by API key (environment import, legacy files).
    pub fn key_only(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            password: String::new(),
            jwt_token: String::new(),
        }
    }
}

/// On-disk entry. Older credential files stored the bare API key string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StoredEntry {
    Record(UserRecord),
    Legacy(String),
}

impl From<StoredEntry> for UserRecord {
    fn from(entry: StoredEntry) -> Self {
        match entry {
            StoredEntry::Record(record) => record,
            StoredEntry::Legacy(api_key) => UserRecord::key_only(api_key),
        }
    }
}

/// Check that a username can double as a file name and an environment variable suffix.
///
/// Accepts 1 to 64 characters from `[A-Za-z0-9_]`.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("username must not be empty".to_string());
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("username may only contain letters, digits and underscores".to_string());
    }
    Ok(())
}

/// Request body for `POST /api/create_api_user`.
///
/// Both fields are optional at the serde level so a missing field maps to a
/// 400 with a readable message instead of a deserialization rejection.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

/// Response body for a successful registration.
#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub api_key: String,
    pub jwt_token: String,
}
