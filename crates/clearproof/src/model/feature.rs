//! Persisted per-submission analysis result.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::theme::ThemePayload;

/// How far (and how well) analysis of a submission progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisStatus {
    /// Queued or in flight; no usable signals yet.
    Pending,
    /// OCR text or theme data was extracted.
    Completed,
    /// The providers answered but found nothing to extract.
    NoSignals,
    /// The submission has no image media.
    NoImages,
    /// Every provider call failed; a retry is warranted.
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::NoSignals => "no_signals",
            AnalysisStatus::NoImages => "no_images",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// Completed and NoSignals both carry usable (possibly empty) signals.
    pub fn has_signals(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::NoSignals)
    }

    pub fn readiness(&self) -> Readiness {
        match self {
            AnalysisStatus::Completed => Readiness::Ready,
            AnalysisStatus::NoSignals => Readiness::ReadyLimitedSignals,
            AnalysisStatus::NoImages => Readiness::NoImages,
            AnalysisStatus::Pending | AnalysisStatus::Failed => Readiness::NotReady,
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "completed" => Ok(AnalysisStatus::Completed),
            "no_signals" => Ok(AnalysisStatus::NoSignals),
            "no_images" => Ok(AnalysisStatus::NoImages),
            "failed" => Ok(AnalysisStatus::Failed),
            other => Err(format!("unknown analysis status '{}'", other)),
        }
    }
}

/// What the review UI shows for a submission's insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Readiness {
    Ready,
    ReadyLimitedSignals,
    NoImages,
    NotReady,
}

impl Readiness {
    pub fn label(&self) -> &'static str {
        match self {
            Readiness::Ready => "Ready",
            Readiness::ReadyLimitedSignals => "Ready, limited signals",
            Readiness::NoImages => "No images to analyze",
            Readiness::NotReady => "Insights not ready yet",
        }
    }
}

/// One row of `content_features`. Exactly one exists per analyzed submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFeature {
    pub id: i64,
    pub submission_id: String,
    pub ocr_text: Option<String>,
    pub theme_tags_json: Option<String>,
    pub analysis_status: AnalysisStatus,
    pub failure_reason: Option<String>,
    pub last_analyzed_at: Option<DateTime<Utc>>,
    pub extracted_at: Option<DateTime<Utc>>,
}

impl ContentFeature {
    pub fn theme_payload(&self) -> Option<ThemePayload> {
        self.theme_tags_json.as_deref().and_then(ThemePayload::parse)
    }

    /// Flattened theme tags, empty when none were stored or the payload is unreadable.
    pub fn theme_tags(&self) -> Vec<String> {
        self.theme_payload().map(|p| p.tags()).unwrap_or_default()
    }
}

/// Values written by one analysis pass. Upserted keyed on `submission_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureUpdate {
    pub submission_id: String,
    pub ocr_text: Option<String>,
    pub theme_tags_json: Option<String>,
    pub analysis_status: AnalysisStatus,
    pub failure_reason: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    pub extracted_at: Option<DateTime<Utc>>,
}
