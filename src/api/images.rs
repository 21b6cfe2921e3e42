//! Image record endpoints.

use actix_web::{delete, get, web, HttpResponse};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::OwnerId;
use crate::error::AppResult;
use crate::models::{ImageListResponse, ImageResponse, Pagination, PaginationParams};
use crate::services::FileStore;
use crate::store::SharedStore;

/// Configure image record routes.
pub fn configure_image_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_completed_analyses)
        .service(get_image)
        .service(delete_image);
}

/// List completed analyses, newest upload first.
///
/// GET /completed-analyses?page=1&limit=20
///
/// The feed is global: every owner's completed records appear. Pending and
/// failed records never do.
#[utoipa::path(
    get,
    path = "/api/v1/completed-analyses",
    tag = "Images",
    params(
        ("page" = Option<u32>, Query, description = "1-indexed page number"),
        ("limit" = Option<u32>, Query, description = "Page size, clamped to 100")
    ),
    responses(
        (status = 200, description = "One page of completed analyses", body = ImageListResponse),
        (status = 401, description = "Missing or invalid owner header", body = crate::error::ErrorResponse)
    )
)]
#[get("/completed-analyses")]
pub(crate) async fn list_completed_analyses(
    _owner: OwnerId,
    query: web::Query<PaginationParams>,
    store: web::Data<SharedStore>,
) -> AppResult<HttpResponse> {
    let page = query.page();
    let limit = query.clamped_limit();

    let (records, total) = store.list_completed(None, page, limit).await?;

    let response = ImageListResponse {
        images: records.into_iter().map(ImageResponse::from).collect(),
        pagination: Pagination::new(page, limit, total),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Fetch a single image record, scoped to its owner.
///
/// GET /images/{id}
#[utoipa::path(
    get,
    path = "/api/v1/images/{id}",
    tag = "Images",
    params(("id" = Uuid, Path, description = "Image record ID")),
    responses(
        (status = 200, description = "The image record", body = ImageResponse),
        (status = 401, description = "Missing or invalid owner header", body = crate::error::ErrorResponse),
        (status = 404, description = "No such record for this owner", body = crate::error::ErrorResponse)
    )
)]
#[get("/images/{id}")]
pub(crate) async fn get_image(
    owner: OwnerId,
    path: web::Path<Uuid>,
    store: web::Data<SharedStore>,
) -> AppResult<HttpResponse> {
    let record = store.get(path.into_inner(), owner.0).await?;
    Ok(HttpResponse::Ok().json(ImageResponse::from(record)))
}

/// Delete an image record and its stored bytes.
///
/// DELETE /images/{id}
///
/// The record is removed first; releasing the file afterwards is best-effort
/// since the record is already gone from every feed and statistic.
#[utoipa::path(
    delete,
    path = "/api/v1/images/{id}",
    tag = "Images",
    params(("id" = Uuid, Path, description = "Image record ID")),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 401, description = "Missing or invalid owner header", body = crate::error::ErrorResponse),
        (status = 404, description = "No such record for this owner", body = crate::error::ErrorResponse)
    )
)]
#[delete("/images/{id}")]
pub(crate) async fn delete_image(
    owner: OwnerId,
    path: web::Path<Uuid>,
    store: web::Data<SharedStore>,
    files: web::Data<Arc<FileStore>>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let record = store.delete(id, owner.0).await?;

    if let Err(e) = files.remove(&record.filename).await {
        warn!("Record {} deleted but file cleanup failed: {}", id, e);
    }

    info!("Image {} deleted by {}", id, owner.0);
    Ok(HttpResponse::NoContent().finish())
}
