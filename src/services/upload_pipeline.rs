//! Upload pipeline: save CSV → convert to SQL → import → archive.
//!
//! Folder layout:
//! - `upload_csv/`: CSVs waiting to be processed (uploads land here)
//! - `upload_sql/`: generated scripts, kept for inspection
//! - `processed_csv/`: CSVs whose import committed
//!
//! A CSV whose conversion or import fails stays in `upload_csv/` so it can
//! be fixed and picked up again by `process_pending`.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    config::Config,
    services::{
        csv_converter::{self, ConvertError},
        sql_importer::ScriptImporter,
    },
};

/// Where the pipeline reads and writes.
#[derive(Debug, Clone)]
pub struct UploadDirs {
    pub csv: PathBuf,
    pub sql: PathBuf,
    pub processed: PathBuf,
}

impl UploadDirs {
    pub fn from_config(config: &Config) -> Self {
        Self {
            csv: config.upload_csv_dir.clone(),
            sql: config.upload_sql_dir.clone(),
            processed: config.processed_csv_dir.clone(),
        }
    }

    pub fn create_all(&self) -> io::Result<()> {
        for dir in [&self.csv, &self.sql, &self.processed] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Result of the database step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportStatus {
    Imported { statements: usize },
    Failed { error: String },
}

/// Composed status of one processed CSV.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    /// Where the CSV ended up (processed folder on success)
    pub csv_file: String,
    pub sql_file: String,
    pub rows: usize,
    pub import: ImportStatus,
}

impl UploadReport {
    pub fn imported(&self) -> bool {
        matches!(self.import, ImportStatus::Imported { .. })
    }
}

#[derive(Clone)]
pub struct UploadPipeline {
    dirs: UploadDirs,
    importer: Arc<dyn ScriptImporter>,
}

impl UploadPipeline {
    pub fn new(dirs: UploadDirs, importer: Arc<dyn ScriptImporter>) -> Self {
        Self { dirs, importer }
    }

    pub fn dirs(&self) -> &UploadDirs {
        &self.dirs
    }

    pub fn importer(&self) -> &Arc<dyn ScriptImporter> {
        &self.importer
    }

    /// Store uploaded bytes under a unique, sanitized name in the upload folder.
    pub fn save_upload(&self, original_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dirs.csv)?;
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            &suffix[..8],
            sanitize_file_name(original_name)
        );
        let path = self.dirs.csv.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Convert and import one CSV already on disk.
    ///
    /// Conversion failures are returned as errors; an import failure is a
    /// partial success reported inside [`UploadReport::import`].
    pub async fn process_file(&self, csv_path: &Path) -> Result<UploadReport, ConvertError> {
        tracing::info!(csv = %csv_path.display(), "converting CSV");
        let conversion = {
            let csv = csv_path.to_path_buf();
            let out = self.dirs.sql.clone();
            tokio::task::spawn_blocking(move || csv_converter::convert(&csv, &out))
                .await
                .map_err(|e| ConvertError::Io {
                    path: csv_path.to_path_buf(),
                    source: io::Error::other(e),
                })??
        };
        let sql_file = conversion.sql_path.display().to_string();

        match self.importer.import(&conversion.sql_path).await {
            Ok(summary) => {
                let archived = self.archive(csv_path);
                Ok(UploadReport {
                    csv_file: archived.display().to_string(),
                    sql_file,
                    rows: conversion.rows,
                    import: ImportStatus::Imported {
                        statements: summary.statements,
                    },
                })
            }
            Err(e) => {
                tracing::error!(csv = %csv_path.display(), sql = %sql_file, error = %e, "database import failed");
                Ok(UploadReport {
                    csv_file: csv_path.display().to_string(),
                    sql_file,
                    rows: conversion.rows,
                    import: ImportStatus::Failed {
                        error: e.to_string(),
                    },
                })
            }
        }
    }

    /// CSV files waiting in the upload folder, oldest name first.
    pub fn pending_files(&self) -> io::Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dirs.csv) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_csv_extension(&path.to_string_lossy()) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Move a processed CSV into the processed folder.
    ///
    /// Failing to move is logged and leaves the file where it was.
    fn archive(&self, csv_path: &Path) -> PathBuf {
        let Some(name) = csv_path.file_name() else {
            return csv_path.to_path_buf();
        };
        let destination = self.dirs.processed.join(name);

        let moved = fs::create_dir_all(&self.dirs.processed)
            .and_then(|_| move_file(csv_path, &destination));
        match moved {
            Ok(()) => {
                tracing::info!(to = %destination.display(), "moved processed CSV");
                destination
            }
            Err(e) => {
                tracing::warn!(csv = %csv_path.display(), error = %e, "could not move processed CSV");
                csv_path.to_path_buf()
            }
        }
    }
}

/// Rename, falling back to copy + delete across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

pub fn has_csv_extension(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".csv")
}

/// Last path component of a client-supplied name, limited to `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload.csv".to_string()
    } else {
        cleaned.to_string()
    }
}
