//! Image upload service.

use actix_multipart::Multipart;
use actix_web::{post, web, HttpResponse};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::OwnerId;
use crate::error::{AppError, AppResult};
use crate::models::{NewImage, UploadResponse};
use crate::services::files::FileStore;
use crate::services::worker::{self, SharedAnalyzer};
use crate::store::SharedStore;

/// Configure upload routes.
pub fn configure_upload_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(upload_image);
}

/// Derive a safe storage extension from the user-supplied filename.
fn storage_extension(original: &str) -> &'static str {
    let ext = original.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "png" => "png",
        "jpg" | "jpeg" => "jpg",
        "gif" => "gif",
        "webp" => "webp",
        "bmp" => "bmp",
        _ => "bin",
    }
}

/// Upload a new image.
///
/// POST /images
/// Content-Type: multipart/form-data with a single `file` field
///
/// Creates a `pending` record, stores the bytes on disk, and spawns a
/// fire-and-forget analysis. The client observes the outcome by polling.
#[utoipa::path(
    post,
    path = "/api/v1/images",
    tag = "Images",
    request_body(content_type = "multipart/form-data", description = "Image file upload"),
    responses(
        (status = 201, description = "Image accepted for analysis", body = UploadResponse),
        (status = 400, description = "Invalid upload", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid owner header", body = crate::error::ErrorResponse)
    )
)]
#[post("/images")]
pub(crate) async fn upload_image(
    owner: OwnerId,
    mut payload: Multipart,
    store: web::Data<SharedStore>,
    files: web::Data<Arc<FileStore>>,
    analyzer: web::Data<SharedAnalyzer>,
    max_upload_size: web::Data<usize>,
) -> AppResult<HttpResponse> {
    let mut original_filename: Option<String> = None;
    let mut bytes: Vec<u8> = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::Validation(format!("Multipart error: {}", e)))?;

        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| AppError::Validation("Missing content disposition".to_string()))?;

        if content_disposition.get_name() != Some("file") {
            // Drain and ignore unknown fields
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| AppError::Validation(format!("Read error: {}", e)))?;
            }
            continue;
        }

        original_filename = content_disposition
            .get_filename()
            .map(|name| name.to_string());

        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| AppError::Validation(format!("Read error: {}", e)))?;
            if bytes.len() + data.len() > **max_upload_size {
                return Err(AppError::Validation(format!(
                    "Upload exceeds maximum size of {} bytes",
                    **max_upload_size
                )));
            }
            bytes.extend_from_slice(&data);
        }
    }

    let original_filename = original_filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Upload must include a named file".to_string()))?;

    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    // Server-generated storage name; the user-supplied name is display-only
    let storage_name = format!(
        "{}.{}",
        Uuid::now_v7(),
        storage_extension(&original_filename)
    );

    files.save(&storage_name, &bytes).await?;

    let record = match store
        .create(NewImage {
            owner_id: owner.0,
            filename: storage_name.clone(),
            original_filename,
        })
        .await
    {
        Ok(record) => record,
        Err(e) => {
            // Do not strand bytes for a record that was never created
            let _ = files.remove(&storage_name).await;
            return Err(e);
        }
    };

    info!(
        "Image {} uploaded by {} ({} bytes), analysis queued",
        record.id,
        owner.0,
        bytes.len()
    );

    worker::spawn_analysis(
        store.get_ref().clone(),
        files.get_ref().clone(),
        analyzer.get_ref().clone(),
        record.id,
        record.filename.clone(),
    );

    Ok(HttpResponse::Created().json(UploadResponse {
        id: record.id,
        status: record.status,
        original_filename: record.original_filename,
        upload_timestamp: record.uploaded_at,
    }))
}
