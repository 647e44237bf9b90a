//! Credential store: registered users, their API keys and last-issued tokens.
//!
//! Persistence sits behind [`CredentialBackend`] so the store can run on the
//! JSON file in production and on an in-memory map in tests.
//!
//! # Concurrency
//!
//! Every read-modify-write goes through one in-process mutex and the JSON
//! backend replaces the file atomically (write temp file, then rename).
//! Two processes sharing one credential file can still race.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    models::user::{CredentialMap, StoredEntry, UserRecord, validate_username},
    services::{
        credential_files::CredentialFiles,
        env_file::{API_KEY_PREFIX, EnvFile, api_key_var},
        token_issuer::{TokenError, TokenIssuer, fingerprint, generate_api_key},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User {username} is already registered")]
    DuplicateUser { username: String, api_key: String },

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Credential file {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where the username → record mapping is persisted.
pub trait CredentialBackend: Send + Sync {
    /// Read the full mapping. A store that was never written is empty.
    fn load(&self) -> Result<CredentialMap, StoreError>;

    /// Overwrite the full mapping.
    fn save(&self, users: &CredentialMap) -> Result<(), StoreError>;
}

/// JSON file backend (`api_keys.json` by default).
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialBackend for JsonFileBackend {
    fn load(&self) -> Result<CredentialMap, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CredentialMap::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(CredentialMap::new());
        }

        let entries: BTreeMap<String, StoredEntry> =
            serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        Ok(entries
            .into_iter()
            .map(|(username, entry)| (username, entry.into()))
            .collect())
    }

    fn save(&self, users: &CredentialMap) -> Result<(), StoreError> {
        // Four-space indent keeps the file readable by hand.
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        users
            .serialize(&mut serializer)
            .map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &buf).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))
    }
}

/// In-memory backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    users: Mutex<CredentialMap>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> Result<CredentialMap, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, users: &CredentialMap) -> Result<(), StoreError> {
        *self
            .users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = users.clone();
        Ok(())
    }
}

/// Registered users plus the side files written on registration.
pub struct CredentialStore {
    backend: Box<dyn CredentialBackend>,
    files: CredentialFiles,
    env_file: Option<EnvFile>,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(backend: impl CredentialBackend + 'static, files: CredentialFiles) -> Self {
        Self {
            backend: Box::new(backend),
            files,
            env_file: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Also record each new key as `API_KEY_<username>` in this `.env` file.
    pub fn with_env_file(mut self, env_file: EnvFile) -> Self {
        self.env_file = Some(env_file);
        self
    }

    pub fn files(&self) -> &CredentialFiles {
        &self.files
    }

    pub fn load(&self) -> Result<CredentialMap, StoreError> {
        self.backend.load()
    }

    pub fn save(&self, users: &CredentialMap) -> Result<(), StoreError> {
        let _guard = self.lock();
        self.backend.save(users)
    }

    /// Register `username`, generating an API key and a first token.
    ///
    /// # Process
    ///
    /// 1. Validate the username
    /// 2. Reject duplicates, handing back the existing key
    /// 3. Generate key and token, write the per-user plaintext files
    /// 4. Persist the record and mirror the key into `.env`
    ///
    /// The record is only persisted once its files exist, so a failed
    /// registration can be retried under the same name.
    ///
    /// # Errors
    ///
    /// - `DuplicateUser`: username already registered (carries its api_key)
    /// - `InvalidUsername`: empty or unsafe username
    /// - `Io` / `Corrupt`: persistence failed
    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        issuer: &TokenIssuer,
    ) -> Result<UserRecord, StoreError> {
        validate_username(username).map_err(StoreError::InvalidUsername)?;

        let _guard = self.lock();
        let mut users = self.backend.load()?;

        if let Some(existing) = users.get(username) {
            return Err(StoreError::DuplicateUser {
                username: username.to_string(),
                api_key: existing.api_key.clone(),
            });
        }

        let record = UserRecord {
            api_key: generate_api_key(),
            password: password.to_string(),
            jwt_token: issuer.issue_token(username)?,
        };
        if let Err(e) = self.files.write(username, &record.api_key, &record.jwt_token) {
            self.files.remove(username);
            return Err(StoreError::io(self.files.dir(), e));
        }

        users.insert(username.to_string(), record.clone());
        if let Err(e) = self.backend.save(&users) {
            self.files.remove(username);
            return Err(e);
        }

        if let Some(env_file) = &self.env_file {
            if let Err(e) = env_file.set_key(&api_key_var(username), &record.api_key) {
                // The JSON file is authoritative; a missing mirror only
                // affects the next startup import.
                tracing::warn!(username, error = %e, "failed to mirror API key into env file");
            }
        }

        tracing::info!(
            username,
            key = %fingerprint(&record.api_key),
            "registered API user"
        );
        Ok(record)
    }

    /// Username owning `api_key`, found by a linear scan of all records.
    pub fn find_by_api_key(&self, api_key: &str) -> Result<Option<String>, StoreError> {
        if api_key.is_empty() {
            return Ok(None);
        }
        Ok(self
            .backend
            .load()?
            .into_iter()
            .find(|(_, record)| keys_match(&record.api_key, api_key))
            .map(|(username, _)| username))
    }

    pub fn verify_api_key(&self, api_key: &str) -> Result<bool, StoreError> {
        Ok(self.find_by_api_key(api_key)?.is_some())
    }

    /// Import `API_KEY_<username>` variables for users the store does not know yet.
    ///
    /// Returns how many users were added.
    pub fn import_env_keys<I>(&self, vars: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let _guard = self.lock();
        let mut users = self.backend.load()?;
        let mut added = 0;

        for (key, value) in vars {
            let Some(username) = key.strip_prefix(API_KEY_PREFIX) else {
                continue;
            };
            if value.is_empty() || validate_username(username).is_err() {
                tracing::warn!(variable = %key, "skipping unusable API key variable");
                continue;
            }
            if users.contains_key(username) {
                continue;
            }
            users.insert(username.to_string(), UserRecord::key_only(value));
            added += 1;
        }

        if added > 0 {
            self.backend.save(&users)?;
            tracing::info!(added, "imported API keys from environment");
        }
        Ok(added)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Compare fixed-length digests so the time taken does not depend on the
/// length of the common prefix of the keys.
fn keys_match(stored: &str, presented: &str) -> bool {
    Sha256::digest(stored.as_bytes()) == Sha256::digest(presented.as_bytes())
}
