//! HTTP API handlers.

pub mod health;
pub mod images;
pub mod openapi;
pub mod stats;

pub use health::configure_health_routes;
pub use images::configure_image_routes;
pub use openapi::ApiDoc;
pub use stats::configure_stats_routes;
