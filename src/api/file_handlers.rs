//! Download of stored stage documents

use super::handlers::{validate_object_id, AppError, TrackerState};
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Quote-safe filename for `Content-Disposition`
fn disposition_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect()
}

/// Stream a stored file back with its content type
pub async fn download_file(
    State(state): State<TrackerState>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    validate_object_id(&file_id, "fileId")?;

    let blob = state
        .blobs
        .get(&file_id)
        .await
        .map_err(|e| {
            warn!(file_id = %file_id, error = %e, "File lookup failed");
            AppError::BadGateway(format!("file storage failed: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    let headers = [
        (header::CONTENT_TYPE, blob.content_type.clone()),
        (header::CONTENT_LENGTH, blob.bytes.len().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", disposition_filename(&blob.filename)),
        ),
    ];
    Ok((headers, blob.bytes).into_response())
}
