//! File upload API handlers.
//!
//! Uploads are accounted for (identifier, name, type, size) and acknowledged;
//! file bodies are read to measure them and then dropped. Nothing is retained
//! server-side.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;

use crate::AppState;
use crate::error::ErrorBody;

// The router's global body limit caps any request well below these
// bounds; they only matter if that limit is raised.

/// Maximum file size in bytes (50MB).
const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Maximum total size for all files in a single request (100MB).
const MAX_TOTAL_SIZE: usize = 100 * 1024 * 1024;

/// Maximum number of files per request.
const MAX_FILES: usize = 10;

/// Accounting record for one accepted file.
#[derive(Debug, Serialize)]
pub struct UploadedFile {
    /// Identifier assigned to the upload.
    pub id: String,
    /// Original filename.
    pub filename: String,
    /// MIME type, taken from the part or guessed from the filename.
    pub content_type: String,
    /// Size in bytes.
    pub size: usize,
}

/// Response for the file upload endpoint.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Accepted files, in submission order.
    pub uploaded: Vec<UploadedFile>,
    /// Per-file problems that did not fail the whole request.
    pub errors: Vec<String>,
}

/// POST /api/files/upload - Accept and account for uploaded files.
pub async fn upload_files(
    State(_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, Json<ErrorBody>)> {
    let mut uploaded = Vec::new();
    let mut errors = Vec::new();
    let mut total_size: usize = 0;
    let mut file_count: usize = 0;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: format!("Failed to read multipart field: {e}"),
                code: "multipart_error".to_string(),
            }),
        )
    })? {
        // Check file count limit
        if file_count >= MAX_FILES {
            errors.push(format!("Maximum file count ({MAX_FILES}) exceeded"));
            break;
        }

        let filename = field
            .file_name()
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("file_{}", uuid::Uuid::new_v4()));

        let content_type = field.content_type().map_or_else(
            || {
                mime_guess::from_path(&filename)
                    .first_or_octet_stream()
                    .to_string()
            },
            ToString::to_string,
        );

        // Read the body; only its size is kept
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: format!("Failed to read file '{filename}': {e}"),
                    code: "read_error".to_string(),
                }),
            )
        })?;

        let size = data.len();

        // Check individual file size
        if size > MAX_FILE_SIZE {
            errors.push(format!(
                "File '{}' exceeds max size ({}MB > {}MB)",
                filename,
                size / (1024 * 1024),
                MAX_FILE_SIZE / (1024 * 1024)
            ));
            continue;
        }

        // Check total size
        if total_size + size > MAX_TOTAL_SIZE {
            errors.push(format!(
                "Total upload size would exceed limit ({}MB)",
                MAX_TOTAL_SIZE / (1024 * 1024)
            ));
            break;
        }

        total_size += size;
        file_count += 1;

        uploaded.push(UploadedFile {
            id: uuid::Uuid::new_v4().to_string(),
            filename,
            content_type,
            size,
        });

        tracing::info!(
            file_count = file_count,
            total_size = total_size,
            "Accounted uploaded file"
        );
    }

    Ok(Json(UploadResponse { uploaded, errors }))
}
