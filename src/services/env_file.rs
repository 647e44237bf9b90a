//! Minimal `.env` writer used to mirror API keys as `API_KEY_<username>`.
//!
//! The file is read back by `dotenvy` at startup, which is how mirrored keys
//! reach the process environment.

use std::{fs, io, path::PathBuf};

/// Prefix of mirrored API key variables.
pub const API_KEY_PREFIX: &str = "API_KEY_";

/// Environment variable name for a user's API key.
pub fn api_key_var(username: &str) -> String {
    format!("{API_KEY_PREFIX}{username}")
}

#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Set `key=value`, replacing an existing assignment or appending a new line.
    pub fn set_key(&self, key: &str, value: &str) -> io::Result<()> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };

        let assignment = format!("{key}={value}");
        let mut replaced = false;
        let mut lines: Vec<String> = existing
            .lines()
            .map(|line| {
                if !replaced && assigns(line, key) {
                    replaced = true;
                    assignment.clone()
                } else {
                    line.to_string()
                }
            })
            .collect();
        if !replaced {
            lines.push(assignment);
        }

        let mut contents = lines.join("\n");
        contents.push('\n');

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)
    }
}

fn assigns(line: &str, key: &str) -> bool {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").unwrap_or(line);
    line.strip_prefix(key)
        .map(|rest| rest.trim_start().starts_with('='))
        .unwrap_or(false)
}
