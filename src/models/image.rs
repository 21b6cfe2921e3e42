//! Image record domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Pagination;

/// Image record lifecycle status.
///
/// `completed` and `failed` are terminal: the only way out of either is
/// deleting the record entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Uploaded, waiting for analysis.
    Pending,
    /// Analysis produced a risk assessment.
    Completed,
    /// Analysis could not produce an assessment.
    Failed,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether no further automatic transition can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordinal safety classification assigned by analysis.
///
/// Ordering is meaningful: `None < Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// All levels in ascending order of severity.
    pub fn all() -> [RiskLevel; 4] {
        [Self::None, Self::Low, Self::Medium, Self::High]
    }

    /// Whether this level counts as a hazard in statistics.
    pub fn is_hazard(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An object the analyzer found in the image.
///
/// Confidence is a fraction in [0,1]; consumers multiply by 100 for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DetectedObject {
    pub name: String,
    pub confidence: f64,
}

/// Per-object confidence entry keyed by object name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfidenceScore {
    pub confidence: f64,
}

/// One uploaded image's tracked state and results.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Storage-relative name under the data directory.
    pub filename: String,
    /// Name the uploader supplied.
    pub original_filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: ImageStatus,
    /// Present only when `status` is `completed`.
    pub risk_level: Option<RiskLevel>,
    /// Present only when `status` is `completed`.
    pub risk_description: Option<String>,
    /// Present only when `status` is `completed`; empty when nothing detected.
    pub detected_objects: Option<Vec<DetectedObject>>,
    /// Present only when `status` is `completed`.
    pub confidence_scores: Option<HashMap<String, ConfidenceScore>>,
}

impl ImageRecord {
    /// Create a fresh pending record.
    pub fn new_pending(owner_id: Uuid, filename: String, original_filename: String) -> Self {
        ImageRecord {
            id: Uuid::now_v7(),
            owner_id,
            filename,
            original_filename,
            uploaded_at: Utc::now(),
            status: ImageStatus::Pending,
            risk_level: None,
            risk_description: None,
            detected_objects: None,
            confidence_scores: None,
        }
    }

    /// Apply a terminal outcome. Callers must have verified `status` is pending.
    pub fn apply_outcome(&mut self, outcome: AnalysisOutcome) {
        match outcome {
            AnalysisOutcome::Completed {
                risk_level,
                risk_description,
                detected_objects,
                confidence_scores,
            } => {
                self.status = ImageStatus::Completed;
                self.risk_level = Some(risk_level);
                self.risk_description = Some(risk_description);
                self.detected_objects = Some(detected_objects);
                self.confidence_scores = confidence_scores;
            }
            AnalysisOutcome::Failed => {
                self.status = ImageStatus::Failed;
                self.risk_level = None;
                self.risk_description = None;
                self.detected_objects = None;
                self.confidence_scores = None;
            }
        }
    }
}

/// Input for creating a pending record.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub owner_id: Uuid,
    pub filename: String,
    pub original_filename: String,
}

/// Terminal outcome of one analysis attempt.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Completed {
        risk_level: RiskLevel,
        risk_description: String,
        detected_objects: Vec<DetectedObject>,
        confidence_scores: Option<HashMap<String, ConfidenceScore>>,
    },
    Failed,
}

/// Wire representation of an image record.
///
/// Field names are normalized to camelCase exactly once, here at the boundary;
/// the internal model stays convention-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub upload_timestamp: DateTime<Utc>,
    pub status: ImageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_objects: Option<Vec<DetectedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_scores: Option<HashMap<String, ConfidenceScore>>,
}

impl From<ImageRecord> for ImageResponse {
    fn from(record: ImageRecord) -> Self {
        ImageResponse {
            id: record.id,
            owner_id: record.owner_id,
            filename: record.filename,
            original_filename: record.original_filename,
            upload_timestamp: record.uploaded_at,
            status: record.status,
            risk_level: record.risk_level,
            risk_description: record.risk_description,
            detected_objects: record.detected_objects,
            confidence_scores: record.confidence_scores,
        }
    }
}

/// Response after uploading an image.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: Uuid,
    pub status: ImageStatus,
    pub original_filename: String,
    pub upload_timestamp: DateTime<Utc>,
}

/// Completed-analyses feed response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageListResponse {
    pub images: Vec<ImageResponse>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }

    #[test]
    fn test_risk_level_round_trip() {
        for level in RiskLevel::all() {
            assert_eq!(RiskLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(RiskLevel::parse("catastrophic"), None);
    }

    #[test]
    fn test_only_none_is_safe() {
        assert!(!RiskLevel::None.is_hazard());
        assert!(RiskLevel::Low.is_hazard());
        assert!(RiskLevel::Medium.is_hazard());
        assert!(RiskLevel::High.is_hazard());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ImageStatus::Pending.is_terminal());
        assert!(ImageStatus::Completed.is_terminal());
        assert!(ImageStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_pending_has_no_result_fields() {
        let record = ImageRecord::new_pending(
            Uuid::new_v4(),
            "abc.png".to_string(),
            "holiday.png".to_string(),
        );
        assert_eq!(record.status, ImageStatus::Pending);
        assert!(record.risk_level.is_none());
        assert!(record.risk_description.is_none());
        assert!(record.detected_objects.is_none());
        assert!(record.confidence_scores.is_none());
    }

    #[test]
    fn test_failed_outcome_clears_result_fields() {
        let mut record = ImageRecord::new_pending(
            Uuid::new_v4(),
            "abc.png".to_string(),
            "holiday.png".to_string(),
        );
        record.apply_outcome(AnalysisOutcome::Failed);
        assert_eq!(record.status, ImageStatus::Failed);
        assert!(record.risk_level.is_none());
        assert!(record.detected_objects.is_none());
    }

    #[test]
    fn test_completed_outcome_sets_result_fields() {
        let mut record = ImageRecord::new_pending(
            Uuid::new_v4(),
            "abc.png".to_string(),
            "holiday.png".to_string(),
        );
        record.apply_outcome(AnalysisOutcome::Completed {
            risk_level: RiskLevel::Low,
            risk_description: "Sharp object detected".to_string(),
            detected_objects: vec![DetectedObject {
                name: "knife".to_string(),
                confidence: 0.82,
            }],
            confidence_scores: None,
        });
        assert_eq!(record.status, ImageStatus::Completed);
        assert_eq!(record.risk_level, Some(RiskLevel::Low));
        assert_eq!(record.detected_objects.as_ref().map(|d| d.len()), Some(1));
    }

    #[test]
    fn test_response_uses_camel_case_wire_names() {
        let record = ImageRecord::new_pending(
            Uuid::new_v4(),
            "abc.png".to_string(),
            "holiday.png".to_string(),
        );
        let json = serde_json::to_value(ImageResponse::from(record)).unwrap();
        assert!(json.get("originalFilename").is_some());
        assert!(json.get("uploadTimestamp").is_some());
        assert!(json.get("original_filename").is_none());
        // Pending records serialize without result fields entirely
        assert!(json.get("riskLevel").is_none());
    }
}
