use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::summary::{ClientSummary, SummaryCache};
use super::tokens::{count_matching, tokenize};
use crate::config::ScoringConfig;
use crate::db::{FeatureRepository, ReviewRepository, SubmissionRepository};
use crate::error::InsightsError;
use crate::model::{AnalysisStatus, ContentFeature, ReviewDecision, Submission};
use crate::providers::{ProviderError, TextGenerator};
use crate::sanitize::sanitize_for_prompt;

/// Score bounds applied before the logistic squash.
pub const SCORE_LIMIT: f64 = 2.0;

/// Approval rate assumed without any review history.
pub const NEUTRAL_RATE: f64 = 0.5;

const MAX_RATIONALE_CHARS: usize = 600;

const RATIONALE_SYSTEM: &str = "You explain approval predictions for creative work to the \
professional who made it. Answer in two or three plain sentences. Do not invent numbers.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PredictionStatus {
    Ready,
    /// Analysis is missing, still running, or failed.
    PendingSignals,
    /// The submission has nothing to analyze.
    MissingHistory,
}

/// The numeric inputs of a score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSignals {
    pub client_approval_rate: f64,
    pub global_approval_rate: f64,
    pub tag_overlap: usize,
    pub overlapping_tags: Vec<String>,
    pub positive_matches: usize,
    pub rejection_matches: usize,
    /// Analysis produced no text or visual signals.
    pub limited_signals: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalPrediction {
    /// Always `Some` with status `Ready`, `None` otherwise.
    pub probability: Option<f64>,
    pub rationale: String,
    pub status: PredictionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<ScoreSignals>,
}

impl ApprovalPrediction {
    fn not_ready(status: PredictionStatus, rationale: impl Into<String>) -> Self {
        Self {
            probability: None,
            rationale: rationale.into(),
            status,
            signals: None,
        }
    }
}

/// Raw score clamped to `[-SCORE_LIMIT, SCORE_LIMIT]`.
pub fn compute_score(signals: &ScoreSignals, weights: &ScoringConfig) -> f64 {
    let base = signals.client_approval_rate - (1.0 - signals.global_approval_rate);
    let tag_boost = signals.tag_overlap as f64 * weights.tag_weight;
    let summary_boost = signals.positive_matches as f64 * weights.phrase_weight;
    let summary_penalty = signals.rejection_matches as f64 * weights.phrase_weight;

    (base + tag_boost + summary_boost - summary_penalty).clamp(-SCORE_LIMIT, SCORE_LIMIT)
}

pub fn logistic(score: f64) -> f64 {
    1.0 / (1.0 + (-score).exp())
}

/// Deterministic explanation used when no rationale can be generated.
pub fn fallback_rationale(signals: &ScoreSignals, probability: f64) -> String {
    let mut parts = vec![format!(
        "Estimated approval likelihood is {:.0}%, based on this client's approval rate of {:.0}% against {:.0}% across all clients.",
        probability * 100.0,
        signals.client_approval_rate * 100.0,
        signals.global_approval_rate * 100.0
    )];

    if signals.tag_overlap > 0 {
        parts.push(format!(
            "It shares {} theme(s) with work this client approved before ({}).",
            signals.tag_overlap,
            signals.overlapping_tags.join(", ")
        ));
    } else {
        parts.push("It shares no themes with previously approved work.".to_string());
    }

    if signals.positive_matches > 0 {
        parts.push(format!(
            "It touches {} of the client's known preferences.",
            signals.positive_matches
        ));
    }
    if signals.rejection_matches > 0 {
        parts.push(format!(
            "It resembles {} past rejection reason(s).",
            signals.rejection_matches
        ));
    }
    if signals.limited_signals {
        parts.push("Image analysis found little text or visual detail, so the estimate leans on history.".to_string());
    }

    parts.join(" ")
}

fn rationale_prompt(signals: &ScoreSignals, probability: f64, summary: Option<&ClientSummary>) -> String {
    let phrases = |items: &[String]| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items
                .iter()
                .map(|p| sanitize_for_prompt(p))
                .collect::<Vec<_>>()
                .join("; ")
        }
    };
    let (preferences, rejections) = match summary {
        Some(s) => (
            phrases(&s.positive_phrases().cloned().collect::<Vec<_>>()),
            phrases(&s.rejection_reasons),
        ),
        None => ("(none)".to_string(), "(none)".to_string()),
    };

    format!(
        "Approval likelihood: {:.0}%\n\
         Client approval rate: {:.0}%\n\
         Approval rate across all clients: {:.0}%\n\
         Themes shared with previously approved work: {}\n\
         Client preferences: {}\n\
         Known rejection reasons: {}\n\
         Preference matches: {}, rejection matches: {}\n\
         Limited image signals: {}\n\n\
         Explain this estimate.",
        probability * 100.0,
        signals.client_approval_rate * 100.0,
        signals.global_approval_rate * 100.0,
        phrases(&signals.overlapping_tags),
        preferences,
        rejections,
        signals.positive_matches,
        signals.rejection_matches,
        if signals.limited_signals { "yes" } else { "no" }
    )
}

/// Text the client sees with a submission: message, captions and OCR.
fn submission_text(submission: &Submission, feature: &ContentFeature) -> String {
    let mut parts: Vec<&str> = Vec::new();
    parts.extend(submission.message.as_deref());
    parts.extend(submission.media.iter().filter_map(|m| m.caption.as_deref()));
    parts.extend(feature.ocr_text.as_deref());
    parts.join("\n")
}

/// Estimates how likely a client is to approve a submission.
pub struct ApprovalScorer {
    submissions: Arc<dyn SubmissionRepository>,
    features: Arc<dyn FeatureRepository>,
    reviews: Arc<dyn ReviewRepository>,
    summaries: Arc<SummaryCache>,
    generator: Arc<dyn TextGenerator>,
    weights: ScoringConfig,
}

impl ApprovalScorer {
    pub fn new(
        submissions: Arc<dyn SubmissionRepository>,
        features: Arc<dyn FeatureRepository>,
        reviews: Arc<dyn ReviewRepository>,
        summaries: Arc<SummaryCache>,
        generator: Arc<dyn TextGenerator>,
        weights: ScoringConfig,
    ) -> Self {
        Self {
            submissions,
            features,
            reviews,
            summaries,
            generator,
            weights,
        }
    }

    pub async fn predict(
        &self,
        client_id: &str,
        submission_id: &str,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ApprovalPrediction, InsightsError> {
        let submission = self
            .submissions
            .find_submission_for_user(submission_id, user_id)
            .await?
            .ok_or_else(|| InsightsError::SubmissionNotFound(submission_id.to_string()))?;

        let feature = match self.features.find_feature(submission_id).await? {
            Some(feature) => feature,
            None => {
                return Ok(ApprovalPrediction::not_ready(
                    PredictionStatus::PendingSignals,
                    "Insights not ready yet: analysis has not run for this submission.",
                ))
            }
        };

        match feature.analysis_status {
            AnalysisStatus::Pending => {
                return Ok(ApprovalPrediction::not_ready(
                    PredictionStatus::PendingSignals,
                    "Insights not ready yet: analysis is still running.",
                ))
            }
            AnalysisStatus::Failed => {
                let reason = feature
                    .failure_reason
                    .as_deref()
                    .unwrap_or("unknown error");
                return Ok(ApprovalPrediction::not_ready(
                    PredictionStatus::PendingSignals,
                    format!("Insights not ready yet: analysis failed ({}).", reason),
                ));
            }
            AnalysisStatus::NoImages => {
                return Ok(ApprovalPrediction::not_ready(
                    PredictionStatus::MissingHistory,
                    "No images to analyze in this submission.",
                ))
            }
            AnalysisStatus::Completed | AnalysisStatus::NoSignals => {}
        }

        let summary = self.summaries.cached_summary(client_id).await?;
        let signals = self
            .gather_signals(client_id, &submission, &feature, summary.as_ref())
            .await?;

        let score = compute_score(&signals, &self.weights);
        let probability = logistic(score);
        debug!(
            "Submission {} for client {}: score {:.3}, probability {:.3}",
            submission_id, client_id, score, probability
        );

        let rationale = self
            .rationale(&signals, probability, summary.as_ref(), cancel)
            .await?;

        Ok(ApprovalPrediction {
            probability: Some(probability),
            rationale,
            status: PredictionStatus::Ready,
            signals: Some(signals),
        })
    }

    async fn gather_signals(
        &self,
        client_id: &str,
        submission: &Submission,
        feature: &ContentFeature,
        summary: Option<&ClientSummary>,
    ) -> Result<ScoreSignals, InsightsError> {
        let client_counts = self.reviews.counts_for_client(client_id).await?;
        let global_counts = self.reviews.global_counts().await?;

        let approved_ids: Vec<String> = self
            .reviews
            .reviews_for_client(client_id)
            .await?
            .into_iter()
            .filter(|r| r.decision == ReviewDecision::Approved && r.submission_id != submission.id)
            .map(|r| r.submission_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let approved_tags: BTreeSet<String> = self
            .features
            .find_features(&approved_ids)
            .await?
            .iter()
            .flat_map(ContentFeature::theme_tags)
            .collect();

        let overlapping_tags: Vec<String> = feature
            .theme_tags()
            .into_iter()
            .filter(|t| approved_tags.contains(t))
            .collect();

        let tokens = tokenize(&submission_text(submission, feature));
        let (positive_matches, rejection_matches) = match summary {
            Some(s) => (
                count_matching(s.positive_phrases(), &tokens),
                count_matching(&s.rejection_reasons, &tokens),
            ),
            None => (0, 0),
        };

        Ok(ScoreSignals {
            client_approval_rate: client_counts.approval_rate_or(NEUTRAL_RATE),
            global_approval_rate: global_counts.approval_rate_or(NEUTRAL_RATE),
            tag_overlap: overlapping_tags.len(),
            overlapping_tags,
            positive_matches,
            rejection_matches,
            limited_signals: feature.analysis_status == AnalysisStatus::NoSignals,
        })
    }

    async fn rationale(
        &self,
        signals: &ScoreSignals,
        probability: f64,
        summary: Option<&ClientSummary>,
        cancel: &CancellationToken,
    ) -> Result<String, InsightsError> {
        let prompt = rationale_prompt(signals, probability, summary);
        match self.generator.generate(RATIONALE_SYSTEM, &prompt, cancel).await {
            Ok(text) if !text.trim().is_empty() => {
                Ok(text.trim().chars().take(MAX_RATIONALE_CHARS).collect())
            }
            Ok(_) => {
                warn!("Rationale generation returned nothing, using template");
                Ok(fallback_rationale(signals, probability))
            }
            Err(ProviderError::Cancelled) => Err(InsightsError::Cancelled),
            Err(e) => {
                if e.is_configuration() {
                    debug!("Text generation not configured, using template rationale");
                } else {
                    warn!("Rationale generation failed: {}", e);
                }
                Ok(fallback_rationale(signals, probability))
            }
        }
    }
}
