//! Domain models for the image safety server.

use utoipa::ToSchema;

pub mod image;
pub mod stats;

// Re-export commonly used types
pub use image::{
    AnalysisOutcome, ConfidenceScore, DetectedObject, ImageListResponse, ImageRecord,
    ImageResponse, ImageStatus, NewImage, RiskLevel, UploadResponse,
};
pub use stats::{RiskCount, StatsSnapshot, StatusCount};

/// Pagination parameters.
#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl PaginationParams {
    /// Resolve the 1-indexed page number.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(default_page()).max(1)
    }

    /// Clamp limit to maximum allowed value.
    pub fn clamped_limit(&self) -> u32 {
        self.limit.unwrap_or(default_limit()).clamp(1, 100)
    }
}

/// Pagination metadata for responses.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    /// Create pagination metadata.
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            ((total as f64) / (limit as f64)).ceil() as u32
        };

        Pagination {
            page,
            limit,
            total,
            total_pages,
        }
    }
}
