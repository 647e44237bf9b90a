//! Batch import of CSVs already waiting in the upload folder.
//!
//! Runs every `*.csv` in `UPLOAD_CSV_DIR` through the same convert → import
//! → archive pipeline as `POST /api/upload_csv`. Exits non-zero when any
//! file failed.

use std::sync::Arc;

use csv_key_gateway::{
    config::Config,
    init_tracing,
    services::{
        sql_importer::PgScriptImporter,
        upload_pipeline::{UploadDirs, UploadPipeline},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.debug);

    let dirs = UploadDirs::from_config(&config);
    dirs.create_all()?;
    let pipeline = UploadPipeline::new(dirs, Arc::new(PgScriptImporter::new(config.database_url()?)));

    let pending = pipeline.pending_files()?;
    if pending.is_empty() {
        tracing::info!(dir = %pipeline.dirs().csv.display(), "no CSV files to process");
        return Ok(());
    }

    let mut failed = 0;
    for path in &pending {
        match pipeline.process_file(path).await {
            Ok(report) if report.imported() => {
                tracing::info!(csv = %report.csv_file, rows = report.rows, "imported");
            }
            Ok(report) => {
                failed += 1;
                tracing::error!(csv = %report.csv_file, sql = %report.sql_file, "import failed");
            }
            Err(e) => {
                failed += 1;
                tracing::error!(csv = %path.display(), error = %e, "conversion failed");
            }
        }
    }

    tracing::info!(total = pending.len(), failed, "batch finished");
    if failed > 0 {
        anyhow::bail!("{failed} of {} CSV files failed", pending.len());
    }
    Ok(())
}
