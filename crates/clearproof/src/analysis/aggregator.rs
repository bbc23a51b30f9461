use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::analyzer::{MediaAnalysisResult, MediaAnalyzer};
use crate::db::FeatureRepository;
use crate::error::AnalysisError;
use crate::model::{
    normalize_tag, AnalysisStatus, ContentFeature, FeatureUpdate, Submission, ThemeInsights,
    ThemePayload,
};

pub const NO_IMAGES_REASON: &str = "Submission has no image files.";
pub const NO_SIGNALS_REASON: &str = "Analyzed images but no text or visual signals detected.";
pub const GENERIC_FAILURE_REASON: &str = "Analysis failed for all images.";

/// Distinct error tags kept in a failure reason.
const MAX_REASON_TAGS: usize = 4;

/// Submission-level result of one analysis pass, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub status: AnalysisStatus,
    pub ocr_text: Option<String>,
    pub theme_tags_json: Option<String>,
    pub failure_reason: Option<String>,
}

impl AnalysisOutcome {
    fn with_reason(status: AnalysisStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            ocr_text: None,
            theme_tags_json: None,
            failure_reason: Some(reason.into()),
        }
    }

    pub fn into_update(self, submission_id: &str, now: DateTime<Utc>) -> FeatureUpdate {
        let extracted_at = self.status.has_signals().then_some(now);
        FeatureUpdate {
            submission_id: submission_id.to_string(),
            ocr_text: self.ocr_text,
            theme_tags_json: self.theme_tags_json,
            analysis_status: self.status,
            failure_reason: self.failure_reason,
            analyzed_at: now,
            extracted_at,
        }
    }
}

/// Folds per-image results into the submission status.
///
/// Order of evaluation: no images, then any signal (Completed), then any
/// provider success (NoSignals), otherwise Failed.
pub fn evaluate(image_count: usize, results: &[MediaAnalysisResult]) -> AnalysisOutcome {
    if image_count == 0 {
        return AnalysisOutcome::with_reason(AnalysisStatus::NoImages, NO_IMAGES_REASON);
    }

    let ocr_text = join_ocr_text(results);
    let theme_tags_json = theme_tags_json(results);

    if ocr_text.is_some() || theme_tags_json.is_some() {
        return AnalysisOutcome {
            status: AnalysisStatus::Completed,
            ocr_text,
            theme_tags_json,
            failure_reason: None,
        };
    }

    if results.iter().any(MediaAnalysisResult::any_success) {
        return AnalysisOutcome::with_reason(AnalysisStatus::NoSignals, NO_SIGNALS_REASON);
    }

    AnalysisOutcome::with_reason(AnalysisStatus::Failed, failure_reason(results))
}

fn join_ocr_text(results: &[MediaAnalysisResult]) -> Option<String> {
    let joined = results
        .iter()
        .filter_map(|r| r.ocr_text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Categorized insights when any category has data, otherwise the plain
/// union of tags, otherwise nothing.
fn theme_tags_json(results: &[MediaAnalysisResult]) -> Option<String> {
    let combined = ThemeInsights::combine(results.iter().map(|r| &r.insights));
    let payload = if combined.has_any_data() {
        ThemePayload::Insights(combined)
    } else {
        let tags: BTreeSet<String> = results
            .iter()
            .flat_map(|r| r.tags.iter())
            .filter_map(|t| normalize_tag(t))
            .collect();
        if tags.is_empty() {
            return None;
        }
        ThemePayload::Tags(tags.into_iter().collect())
    };

    match serde_json::to_string(&payload) {
        Ok(json) => Some(json),
        Err(e) => {
            debug!("Could not serialize theme payload: {}", e);
            None
        }
    }
}

fn failure_reason(results: &[MediaAnalysisResult]) -> String {
    let mut seen = BTreeSet::new();
    let tags: Vec<&str> = results
        .iter()
        .flat_map(|r| r.errors.iter())
        .filter(|e| seen.insert(e.as_str()))
        .take(MAX_REASON_TAGS)
        .map(String::as_str)
        .collect();

    if tags.is_empty() {
        GENERIC_FAILURE_REASON.to_string()
    } else {
        tags.join(", ")
    }
}

/// Runs one analysis pass for a submission and stores the outcome.
pub struct FeatureAggregator {
    analyzer: MediaAnalyzer,
    features: Arc<dyn FeatureRepository>,
}

impl FeatureAggregator {
    pub fn new(analyzer: MediaAnalyzer, features: Arc<dyn FeatureRepository>) -> Self {
        Self { analyzer, features }
    }

    /// Analyzes every image of `submission` and upserts its content feature.
    ///
    /// Cancellation surfaces as [`AnalysisError::Cancelled`] and leaves the
    /// stored row untouched. Persistence failures propagate.
    pub async fn analyze_submission(
        &self,
        submission: &Submission,
        cancel: &CancellationToken,
    ) -> Result<ContentFeature, AnalysisError> {
        let image_count = submission.images().count();
        let results = if image_count == 0 {
            Vec::new()
        } else {
            self.analyzer.analyze_all(&submission.media, cancel).await?
        };

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let outcome = evaluate(image_count, &results);
        info!(
            "Submission {} analyzed: {} ({} images)",
            submission.id, outcome.status, image_count
        );
        if let Some(reason) = &outcome.failure_reason {
            debug!("Submission {} reason: {}", submission.id, reason);
        }

        let update = outcome.into_update(&submission.id, Utc::now());
        Ok(self.features.upsert_feature(&update).await?)
    }
}
