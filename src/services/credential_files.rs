//! Per-user plaintext credential files.
//!
//! Registration drops `<username>_api_key.txt` and `<username>_token.txt`
//! into one directory; the download endpoints serve them back by username.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Which credential file to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    ApiKey,
    Token,
}

impl CredentialKind {
    /// File name for `username`.
    pub fn file_name(self, username: &str) -> String {
        match self {
            CredentialKind::ApiKey => format!("{username}_api_key.txt"),
            CredentialKind::Token => format!("{username}_token.txt"),
        }
    }
}

/// Directory holding the per-user credential files.
#[derive(Debug, Clone)]
pub struct CredentialFiles {
    dir: PathBuf,
}

impl CredentialFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of one credential file. Callers validate `username` first.
    pub fn path(&self, kind: CredentialKind, username: &str) -> PathBuf {
        self.dir.join(kind.file_name(username))
    }

    /// Write both files for a freshly registered user.
    pub fn write(&self, username: &str, api_key: &str, jwt_token: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(CredentialKind::ApiKey, username), api_key)?;
        fs::write(self.path(CredentialKind::Token, username), jwt_token)?;
        Ok(())
    }

    /// Delete both files of `username`, ignoring ones that are already gone.
    pub fn remove(&self, username: &str) {
        for kind in [CredentialKind::ApiKey, CredentialKind::Token] {
            let path = self.path(kind, username);
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(file = %path.display(), error = %e, "failed to remove credential file");
                }
            }
        }
    }

    /// Read one file back. `Ok(None)` when it does not exist.
    pub fn read(&self, kind: CredentialKind, username: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(kind, username)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_each_kind() {
        let dir = std::env::temp_dir().join(format!("cred-files-{}", uuid::Uuid::new_v4()));
        let files = CredentialFiles::new(&dir);

        files.write("carol", "k3y", "t0ken").unwrap();

        assert_eq!(
            files.read(CredentialKind::ApiKey, "carol").unwrap().as_deref(),
            Some(&b"k3y"[..])
        );
        assert_eq!(
            files.read(CredentialKind::Token, "carol").unwrap().as_deref(),
            Some(&b"t0ken"[..])
        );
        assert!(dir.join("carol_token.txt").exists());
        assert_eq!(files.read(CredentialKind::Token, "dave").unwrap(), None);

        files.remove("carol");
        assert_eq!(files.read(CredentialKind::ApiKey, "carol").unwrap(), None);
        files.remove("carol");

        fs::remove_dir_all(dir).ok();
    }
}
