//! Health and readiness endpoints.

use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

use crate::store::SharedStore;

/// Configure health routes.
pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(ready);
}

/// Liveness probe. Always 200 while the process is up.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is alive"))
)]
#[get("/health")]
pub(crate) async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe. Exercises the record store so a broken database
/// connection flips the service out of rotation.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Store reachable"),
        (status = 503, description = "Store unreachable")
    )
)]
#[get("/ready")]
pub(crate) async fn ready(store: web::Data<SharedStore>) -> impl Responder {
    match store.stats().await {
        Ok(_) => HttpResponse::Ok().json(json!({ "status": "ready" })),
        Err(e) => {
            tracing::error!("Readiness check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unavailable",
            }))
        }
    }
}
