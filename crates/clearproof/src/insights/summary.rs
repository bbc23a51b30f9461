use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::db::{FeatureRepository, ReviewRepository, SummaryRepository};
use crate::error::InsightsError;
use crate::model::{
    AnalysisStatus, ContentFeature, Review, ReviewCounts, ReviewDecision, SummaryEntry,
};
use crate::providers::parse::parse_string_array;
use crate::providers::{ProviderError, TextGenerator};
use crate::sanitize::sanitize_for_prompt;

/// Most frequent approved tags kept in a summary.
pub const TOP_TAG_LIMIT: usize = 10;

const MAX_PROMPT_COMMENTS: usize = 20;
const MAX_COMMENT_CHARS: usize = 300;

const SUMMARY_SYSTEM: &str = "You analyze how a client reviews creative work. \
Answer with a JSON array of 3 to 5 short phrases (at most six words each) and nothing else.";

/// How well the client's review history is covered by finished analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoverageStatus {
    /// The client has not reviewed anything yet.
    InsufficientHistory,
    /// Reviews exist but none of the reviewed submissions has usable features.
    PendingAnalysis,
    /// Some reviewed submissions are analyzed, others are pending or failed.
    Partial,
    Ready,
}

impl CoverageStatus {
    /// Whether there is enough analyzed history to ask for generated phrases.
    pub fn allows_generation(&self) -> bool {
        matches!(self, CoverageStatus::Partial | CoverageStatus::Ready)
    }
}

/// Per-client preference summary derived from review history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub client_id: String,
    pub style_preferences: Vec<String>,
    pub recurring_positives: Vec<String>,
    pub rejection_reasons: Vec<String>,
    pub top_tags: Vec<String>,
    pub coverage: CoverageStatus,
    pub missing_signals: Vec<String>,
    pub approved_count: u64,
    pub rejected_count: u64,
    pub generated_at: DateTime<Utc>,
}

impl ClientSummary {
    pub fn counts(&self) -> ReviewCounts {
        ReviewCounts::new(self.approved_count, self.rejected_count)
    }

    /// Phrases that speak for approval.
    pub fn positive_phrases(&self) -> impl Iterator<Item = &String> {
        self.style_preferences
            .iter()
            .chain(self.recurring_positives.iter())
    }
}

#[derive(Debug, Clone, Copy)]
enum SummaryAspect {
    StylePreferences,
    RecurringPositives,
    RejectionReasons,
}

impl SummaryAspect {
    fn name(&self) -> &'static str {
        match self {
            SummaryAspect::StylePreferences => "style preferences",
            SummaryAspect::RecurringPositives => "recurring positives",
            SummaryAspect::RejectionReasons => "rejection reasons",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            SummaryAspect::StylePreferences => {
                "List the visual and stylistic preferences this client shows in the work they approve."
            }
            SummaryAspect::RecurringPositives => {
                "List what this client repeatedly praises in approved work."
            }
            SummaryAspect::RejectionReasons => {
                "List the most common reasons this client rejects work."
            }
        }
    }
}

/// Outcome of the coverage check over reviewed submissions.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub status: CoverageStatus,
    pub usable: usize,
    pub pending: usize,
    pub failed: usize,
}

/// Classifies how many reviewed submissions have usable analysis.
///
/// A reviewed submission without a feature row counts as pending. Failed
/// analysis is retried by the backfill scan, so a client whose reviewed
/// work has only failed rows is reported as still pending.
pub fn assess_coverage(
    counts: ReviewCounts,
    reviewed: &BTreeSet<String>,
    features: &[ContentFeature],
) -> Coverage {
    let by_submission: HashMap<&str, &ContentFeature> = features
        .iter()
        .map(|f| (f.submission_id.as_str(), f))
        .collect();

    let (mut usable, mut pending, mut failed) = (0, 0, 0);
    for id in reviewed {
        match by_submission.get(id.as_str()).map(|f| f.analysis_status) {
            Some(AnalysisStatus::Completed) | Some(AnalysisStatus::NoSignals) => usable += 1,
            Some(AnalysisStatus::Failed) => failed += 1,
            Some(AnalysisStatus::NoImages) => {}
            Some(AnalysisStatus::Pending) | None => pending += 1,
        }
    }

    let status = if counts.total() == 0 {
        CoverageStatus::InsufficientHistory
    } else if usable == 0 && pending + failed > 0 {
        CoverageStatus::PendingAnalysis
    } else if pending + failed > 0 {
        CoverageStatus::Partial
    } else {
        CoverageStatus::Ready
    };

    Coverage {
        status,
        usable,
        pending,
        failed,
    }
}

/// Most frequent tags, ties broken alphabetically.
pub fn top_tags<'a, I>(features: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a ContentFeature>,
{
    let mut frequency: BTreeMap<String, usize> = BTreeMap::new();
    for feature in features {
        for tag in feature.theme_tags() {
            *frequency.entry(tag).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(tag, _)| tag).collect()
}

/// Latest decision per reviewed submission.
fn latest_decisions(reviews: &[Review]) -> BTreeMap<String, ReviewDecision> {
    reviews
        .iter()
        .map(|r| (r.submission_id.clone(), r.decision))
        .collect()
}

fn comments(reviews: &[Review], decision: ReviewDecision) -> Vec<String> {
    reviews
        .iter()
        .filter(|r| r.decision == decision)
        .filter_map(|r| r.comment.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

fn missing_signal_notes(coverage: &Coverage, counts: ReviewCounts, comment_count: usize) -> Vec<String> {
    let mut notes = Vec::new();
    if counts.total() == 0 {
        notes.push("No reviews yet.".to_string());
        return notes;
    }
    if coverage.pending > 0 {
        notes.push(format!(
            "{} reviewed submission(s) still awaiting analysis.",
            coverage.pending
        ));
    }
    if coverage.failed > 0 {
        notes.push(format!(
            "{} reviewed submission(s) failed analysis.",
            coverage.failed
        ));
    }
    if comment_count == 0 {
        notes.push("No reviewer comments yet.".to_string());
    }
    notes
}

fn prompt_lines(items: &[String]) -> String {
    if items.is_empty() {
        return "  (none)".to_string();
    }
    items
        .iter()
        .rev()
        .take(MAX_PROMPT_COMMENTS)
        .map(|c| {
            let capped: String = sanitize_for_prompt(c).chars().take(MAX_COMMENT_CHARS).collect();
            format!("  - {}", capped)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_context(top_tags: &[String], approved: &[String], rejected: &[String]) -> String {
    let tags = if top_tags.is_empty() {
        "(none)".to_string()
    } else {
        top_tags
            .iter()
            .map(|t| sanitize_for_prompt(t))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "Frequent tags in approved work: {}\n\nComments on approved work:\n{}\n\nComments on rejected work:\n{}",
        tags,
        prompt_lines(approved),
        prompt_lines(rejected)
    )
}

/// Cached, count-invalidated client summaries.
///
/// A stored summary is reused only while the client's approved and
/// rejected review counts equal the counts it was computed from.
pub struct SummaryCache {
    reviews: Arc<dyn ReviewRepository>,
    features: Arc<dyn FeatureRepository>,
    summaries: Arc<dyn SummaryRepository>,
    generator: Arc<dyn TextGenerator>,
    always_refresh: bool,
}

impl SummaryCache {
    pub fn new(
        reviews: Arc<dyn ReviewRepository>,
        features: Arc<dyn FeatureRepository>,
        summaries: Arc<dyn SummaryRepository>,
        generator: Arc<dyn TextGenerator>,
        always_refresh: bool,
    ) -> Self {
        Self {
            reviews,
            features,
            summaries,
            generator,
            always_refresh,
        }
    }

    /// Last stored summary for `client_id`, whatever counts it was built from.
    pub async fn cached_summary(&self, client_id: &str) -> Result<Option<ClientSummary>, InsightsError> {
        let entry = self.summaries.find_summary(client_id).await?;
        Ok(entry.as_ref().and_then(decode))
    }

    /// Returns the cached summary when its counts still match, otherwise
    /// recomputes and stores a new one.
    pub async fn get_or_refresh(
        &self,
        client_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ClientSummary, InsightsError> {
        let counts = self.reviews.counts_for_client(client_id).await?;

        if !self.always_refresh {
            if let Some(entry) = self.summaries.find_summary(client_id).await? {
                if entry.counts() == counts {
                    if let Some(summary) = decode(&entry) {
                        debug!("Summary cache hit for client {}", client_id);
                        return Ok(summary);
                    }
                } else {
                    debug!(
                        "Summary for client {} is stale ({}:{} -> {}:{})",
                        client_id,
                        entry.approved_count,
                        entry.rejected_count,
                        counts.approved,
                        counts.rejected
                    );
                }
            }
        }

        let summary = self.compute(client_id, counts, cancel).await?;
        if cancel.is_cancelled() {
            return Err(InsightsError::Cancelled);
        }

        let entry = SummaryEntry {
            client_id: client_id.to_string(),
            payload_json: serde_json::to_string(&summary)?,
            approved_count: counts.approved,
            rejected_count: counts.rejected,
            updated_at: summary.generated_at,
        };
        self.summaries.upsert_summary(&entry).await?;
        info!(
            "Refreshed summary for client {} ({:?})",
            client_id, summary.coverage
        );
        Ok(summary)
    }

    async fn compute(
        &self,
        client_id: &str,
        counts: ReviewCounts,
        cancel: &CancellationToken,
    ) -> Result<ClientSummary, InsightsError> {
        let reviews = self.reviews.reviews_for_client(client_id).await?;
        let decisions = latest_decisions(&reviews);
        let reviewed: BTreeSet<String> = decisions.keys().cloned().collect();
        let ids: Vec<String> = reviewed.iter().cloned().collect();
        let features = self.features.find_features(&ids).await?;

        let coverage = assess_coverage(counts, &reviewed, &features);
        let approved_features = features.iter().filter(|f| {
            decisions.get(&f.submission_id) == Some(&ReviewDecision::Approved)
        });
        let top_tags = top_tags(approved_features, TOP_TAG_LIMIT);

        let approved_comments = comments(&reviews, ReviewDecision::Approved);
        let rejected_comments = comments(&reviews, ReviewDecision::Rejected);
        let missing_signals = missing_signal_notes(
            &coverage,
            counts,
            approved_comments.len() + rejected_comments.len(),
        );

        let (style_preferences, recurring_positives, rejection_reasons) =
            if coverage.status.allows_generation() {
                let context = build_context(&top_tags, &approved_comments, &rejected_comments);
                tokio::try_join!(
                    self.generate_list(SummaryAspect::StylePreferences, &context, cancel),
                    self.generate_list(SummaryAspect::RecurringPositives, &context, cancel),
                    self.generate_list(SummaryAspect::RejectionReasons, &context, cancel),
                )?
            } else {
                debug!(
                    "Skipping summary generation for client {}: {:?}",
                    client_id, coverage.status
                );
                (Vec::new(), Vec::new(), Vec::new())
            };

        Ok(ClientSummary {
            client_id: client_id.to_string(),
            style_preferences,
            recurring_positives,
            rejection_reasons,
            top_tags,
            coverage: coverage.status,
            missing_signals,
            approved_count: counts.approved,
            rejected_count: counts.rejected,
            generated_at: Utc::now(),
        })
    }

    /// Asks for one list. Configuration errors and cancellation propagate;
    /// anything else yields an empty list.
    async fn generate_list(
        &self,
        aspect: SummaryAspect,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, InsightsError> {
        let prompt = format!("{}\n\n{}", aspect.instruction(), context);
        match self.generator.generate(SUMMARY_SYSTEM, &prompt, cancel).await {
            Ok(text) => match parse_string_array(&text) {
                Some(items) => Ok(items),
                None => {
                    warn!("Could not parse generated {} as a JSON array", aspect.name());
                    Ok(Vec::new())
                }
            },
            Err(ProviderError::Cancelled) => Err(InsightsError::Cancelled),
            Err(e) if e.is_configuration() => Err(InsightsError::Configuration(e)),
            Err(e) => {
                warn!("Generating {} failed: {}", aspect.name(), e);
                Ok(Vec::new())
            }
        }
    }
}

fn decode(entry: &SummaryEntry) -> Option<ClientSummary> {
    match serde_json::from_str(&entry.payload_json) {
        Ok(summary) => Some(summary),
        Err(e) => {
            warn!("Ignoring unreadable summary for client {}: {}", entry.client_id, e);
            None
        }
    }
}
