//! CSV upload handler.
//!
//! - POST /api/upload_csv - multipart upload, converted and imported

use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};

use crate::{
    app::AppState,
    error::AppError,
    middleware::auth::AuthContext,
    services::upload_pipeline::{UploadReport, has_csv_extension},
};

/// Multipart field holding the CSV.
const FILE_FIELD: &str = "file";

/// Upload a CSV and import it.
///
/// # Authentication
///
/// Requires a registered API key in the `API-Key` header.
///
/// # Request
///
/// `multipart/form-data` with a `file` part whose name ends in `.csv`.
///
/// # Response
///
/// - **200 OK**: converted and imported
/// - **400 Bad Request**: no file, not a CSV, missing columns, bad numbers
/// - **401 Unauthorized**: missing or unknown API key
/// - **500 Internal Server Error**: converted but the import failed; the
///   body still reports the saved CSV and generated script
///
/// ```json
/// {
///   "csv_file": "processed_csv/20261016_101500_ab12cd34_reviews.csv",
///   "sql_file": "upload_sql/places_reviews_20261016_101500_123_9f8e7d6c.sql",
///   "rows": 42,
///   "import": { "status": "imported", "statements": 43 }
/// }
/// ```
pub async fn upload_csv(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadReport>), AppError> {
    let mut multipart = multipart.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let (file_name, bytes) = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidRequest(e.body_text()))?
            .ok_or_else(|| AppError::InvalidRequest(format!("No '{FILE_FIELD}' part in upload")))?;

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(AppError::InvalidRequest("No file selected".into()));
        }
        if !has_csv_extension(&file_name) {
            return Err(AppError::InvalidRequest("Only .csv files are accepted".into()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(e.body_text()))?;
        break (file_name, bytes);
    };

    let size = bytes.len();
    let saved = {
        let uploads = state.uploads.clone();
        let name = file_name.clone();
        tokio::task::spawn_blocking(move || uploads.save_upload(&name, &bytes))
            .await
            .map_err(std::io::Error::other)??
    };
    tracing::info!(
        username = %auth.username,
        file = %file_name,
        saved = %saved.display(),
        size,
        "CSV uploaded"
    );

    let report = state.uploads.process_file(&saved).await?;
    let status = if report.imported() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json(report)))
}
