//! Image analysis seam.
//!
//! The actual computer-vision model is out of scope; `ImageAnalyzer` is the
//! trait the worker drives, and `HeuristicAnalyzer` is the built-in
//! implementation used until a real model backend is wired in.

use std::collections::HashMap;

use crate::models::{AnalysisOutcome, ConfidenceScore, DetectedObject, RiskLevel};

/// Errors an analyzer can raise. Any of them fails the record terminally.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("empty image payload")]
    EmptyPayload,

    #[error("unrecognized image format")]
    UnrecognizedFormat,

    #[error("analysis failed: {0}")]
    Internal(String),
}

/// A successful risk assessment.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub risk_level: RiskLevel,
    pub risk_description: String,
    pub detected_objects: Vec<DetectedObject>,
    pub confidence_scores: Option<HashMap<String, ConfidenceScore>>,
}

impl From<Analysis> for AnalysisOutcome {
    fn from(analysis: Analysis) -> Self {
        AnalysisOutcome::Completed {
            risk_level: analysis.risk_level,
            risk_description: analysis.risk_description,
            detected_objects: analysis.detected_objects,
            confidence_scores: analysis.confidence_scores,
        }
    }
}

/// Produces a risk assessment from raw image bytes.
#[async_trait::async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, bytes: &[u8]) -> Result<Analysis, AnalyzerError>;
}

/// Image formats the built-in analyzer recognizes by magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Bmp,
}

impl ImageFormat {
    /// Sniff the format from the payload's leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else if bytes.starts_with(b"BM") {
            Some(Self::Bmp)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Gif => "GIF",
            Self::WebP => "WebP",
            Self::Bmp => "BMP",
        }
    }
}

/// Built-in placeholder analyzer.
///
/// Validates that the payload is a recognizable image and reports a clean
/// assessment; anything unrecognizable fails the analysis, exercising the
/// `failed` path end to end.
#[derive(Debug, Default)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ImageAnalyzer for HeuristicAnalyzer {
    async fn analyze(&self, bytes: &[u8]) -> Result<Analysis, AnalyzerError> {
        if bytes.is_empty() {
            return Err(AnalyzerError::EmptyPayload);
        }

        let format = ImageFormat::sniff(bytes).ok_or(AnalyzerError::UnrecognizedFormat)?;

        Ok(Analysis {
            risk_level: RiskLevel::None,
            risk_description: format!(
                "No hazardous content detected in {} image ({} bytes)",
                format.as_str(),
                bytes.len()
            ),
            detected_objects: Vec::new(),
            confidence_scores: None,
        })
    }
}
