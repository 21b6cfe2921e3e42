//! OpenAPI documentation surface.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::models::{
    ConfidenceScore, DetectedObject, ImageListResponse, ImageResponse, ImageStatus, Pagination,
    PaginationParams, RiskCount, RiskLevel, StatsSnapshot, StatusCount, UploadResponse,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Image Safety Server API",
        description = "Upload images, track their analysis lifecycle, and read aggregate safety statistics.",
        version = env!("CARGO_PKG_VERSION")
    ),
    paths(
        crate::services::upload::upload_image,
        crate::api::images::list_completed_analyses,
        crate::api::images::get_image,
        crate::api::images::delete_image,
        crate::api::stats::get_stats,
        crate::api::health::health,
        crate::api::health::ready,
    ),
    components(schemas(
        ImageStatus,
        RiskLevel,
        DetectedObject,
        ConfidenceScore,
        ImageResponse,
        UploadResponse,
        ImageListResponse,
        Pagination,
        PaginationParams,
        StatusCount,
        RiskCount,
        StatsSnapshot,
        ErrorResponse,
    )),
    tags(
        (name = "Images", description = "Upload and image record management"),
        (name = "Stats", description = "Aggregate statistics"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
