//! Aggregate statistics endpoint.

use actix_web::{get, web, HttpResponse};

use crate::auth::OwnerId;
use crate::error::AppResult;
use crate::models::StatsSnapshot;
use crate::store::SharedStore;

/// Configure stats routes.
pub fn configure_stats_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_stats);
}

/// Current status and risk distributions.
///
/// GET /stats
///
/// Recomputed from the record store on every call. Zero-count groups are
/// omitted from both distributions.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "Stats",
    responses(
        (status = 200, description = "Current distributions", body = StatsSnapshot),
        (status = 401, description = "Missing or invalid owner header", body = crate::error::ErrorResponse)
    )
)]
#[get("/stats")]
pub(crate) async fn get_stats(_owner: OwnerId, store: web::Data<SharedStore>) -> AppResult<HttpResponse> {
    let snapshot = store.stats().await?;
    Ok(HttpResponse::Ok().json(snapshot))
}
