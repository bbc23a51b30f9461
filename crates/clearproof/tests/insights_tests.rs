//! Client summaries and approval predictions over seeded review history.

mod common;

use tokio_util::sync::CancellationToken;

use clearproof::insights::PredictionStatus;
use clearproof::model::{AnalysisStatus, ReviewDecision};
use clearproof::{CoverageStatus, InsightsError, Pipeline};

use common::providers::{RATIONALE_REPLY, STYLE_REPLY};
use common::{review, FeatureBuilder, SubmissionBuilder, TestHarness, TextMode};

const APPROVED_TAGS: &[&str] = &["summer", "beach", "bold"];

/// Seeds client `acme` with seven approved and three rejected submissions,
/// all analyzed.
fn seed_history(harness: &TestHarness) {
    for i in 0..10 {
        let id = format!("past-{}", i);
        harness.seed(SubmissionBuilder::new(&id).image("post.png"));
        let (decision, tags, comment) = if i < 7 {
            (ReviewDecision::Approved, APPROVED_TAGS, "Love the bright colors")
        } else {
            (ReviewDecision::Rejected, &["winter", "gloomy"][..], "Too cluttered")
        };
        harness.put_feature(FeatureBuilder::completed(&id, tags).build());
        harness.add_review(review(
            &format!("rev-{}", i),
            &id,
            "acme",
            decision,
            Some(comment),
            100 - i as i64,
        ));
    }
}

fn seed_candidate(harness: &TestHarness, id: &str, message: &str, tags: &[&str]) {
    harness.seed(SubmissionBuilder::new(id).owner("designer-1").message(message).image("draft.png"));
    harness.put_feature(FeatureBuilder::completed(id, tags).build());
}

fn pipeline_with_history(harness: &TestHarness) -> Pipeline {
    seed_history(harness);
    harness.pipeline()
}

#[tokio::test]
async fn test_summary_is_cached_until_counts_change() {
    let harness = TestHarness::new();
    let pipeline = pipeline_with_history(&harness);
    let cancel = CancellationToken::new();

    let first = pipeline.client_summary("acme", &cancel).await.unwrap();
    assert_eq!(first.coverage, CoverageStatus::Ready);
    assert_eq!(first.approved_count, 7);
    assert_eq!(first.rejected_count, 3);
    assert_eq!(first.style_preferences, vec!["bold colors", "summer vibe", "clean type"]);
    assert_eq!(first.recurring_positives, vec!["bright palette", "strong logo"]);
    assert_eq!(first.rejection_reasons, vec!["cluttered layout", "dark tones"]);
    assert_eq!(first.top_tags, vec!["beach", "bold", "summer"]);
    assert!(first.missing_signals.is_empty());
    assert_eq!(harness.text.calls(), 3);

    let second = pipeline.client_summary("acme", &cancel).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(harness.text.calls(), 3);

    let entry = harness.summary_entry("acme").expect("summary stored");
    assert_eq!((entry.approved_count, entry.rejected_count), (7, 3));

    harness.seed(SubmissionBuilder::new("late").image("late.png"));
    harness.put_feature(FeatureBuilder::completed("late", &["summer"]).build());
    harness.add_review(review("rev-late", "late", "acme", ReviewDecision::Rejected, None, 1));

    let third = pipeline.client_summary("acme", &cancel).await.unwrap();
    assert_eq!(third.rejected_count, 4);
    assert_eq!(harness.text.calls(), 6);
    assert_eq!(harness.summary_entry("acme").unwrap().rejected_count, 4);
}

#[tokio::test]
async fn test_always_refresh_skips_the_cache() {
    let mut harness = TestHarness::new();
    harness.summary.always_refresh = true;
    let pipeline = pipeline_with_history(&harness);
    let cancel = CancellationToken::new();

    pipeline.client_summary("acme", &cancel).await.unwrap();
    pipeline.client_summary("acme", &cancel).await.unwrap();
    assert_eq!(harness.text.calls(), 6);
}

#[tokio::test]
async fn test_summary_without_reviews_skips_generation() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let summary = pipeline
        .client_summary("newcomer", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.coverage, CoverageStatus::InsufficientHistory);
    assert!(summary.style_preferences.is_empty());
    assert!(summary.top_tags.is_empty());
    assert_eq!(summary.missing_signals, vec!["No reviews yet."]);
    assert_eq!(harness.text.calls(), 0);
}

#[tokio::test]
async fn test_summary_waits_for_pending_analysis() {
    let harness = TestHarness::new();
    harness.seed(SubmissionBuilder::new("s1").image("a.png"));
    harness.add_review(review("r1", "s1", "acme", ReviewDecision::Approved, Some("Nice"), 5));
    let pipeline = harness.pipeline();

    let summary = pipeline
        .client_summary("acme", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.coverage, CoverageStatus::PendingAnalysis);
    assert!(summary.style_preferences.is_empty());
    assert!(summary
        .missing_signals
        .iter()
        .any(|n| n.contains("awaiting analysis")));
    assert_eq!(harness.text.calls(), 0);
}

#[tokio::test]
async fn test_partial_coverage_still_generates() {
    let harness = TestHarness::new();
    harness.seed(SubmissionBuilder::new("s1").image("a.png"));
    harness.seed(SubmissionBuilder::new("s2").image("b.png"));
    harness.put_feature(FeatureBuilder::completed("s1", &["summer"]).build());
    harness.put_feature(
        FeatureBuilder::with_status("s2", AnalysisStatus::Failed)
            .failure("ocr:Timeout")
            .build(),
    );
    harness.add_review(review("r1", "s1", "acme", ReviewDecision::Approved, None, 5));
    harness.add_review(review("r2", "s2", "acme", ReviewDecision::Rejected, None, 4));
    let pipeline = harness.pipeline();

    let summary = pipeline
        .client_summary("acme", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.coverage, CoverageStatus::Partial);
    assert_eq!(summary.top_tags, vec!["summer"]);
    assert!(!summary.style_preferences.is_empty());
    assert!(summary.missing_signals.iter().any(|n| n.contains("failed analysis")));
    assert!(summary.missing_signals.iter().any(|n| n.contains("No reviewer comments")));
}

#[tokio::test]
async fn test_summary_configuration_error_propagates() {
    let harness = TestHarness::new();
    harness.text.set_mode(TextMode::NotConfigured);
    let pipeline = pipeline_with_history(&harness);

    let err = pipeline
        .client_summary("acme", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, InsightsError::Configuration(_)));
    assert!(harness.summary_entry("acme").is_none());
}

#[tokio::test]
async fn test_summary_degrades_on_unusable_answers() {
    let harness = TestHarness::new();
    harness.text.set_mode(TextMode::Garbage);
    let pipeline = pipeline_with_history(&harness);

    let summary = pipeline
        .client_summary("acme", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.coverage, CoverageStatus::Ready);
    assert!(summary.style_preferences.is_empty());
    assert!(summary.recurring_positives.is_empty());
    assert!(summary.rejection_reasons.is_empty());
    assert_eq!(summary.top_tags, vec!["beach", "bold", "summer"]);
}

#[tokio::test]
async fn test_cancelled_summary_is_not_stored() {
    let harness = TestHarness::new();
    let pipeline = pipeline_with_history(&harness);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline.client_summary("acme", &cancel).await.unwrap_err();
    assert!(matches!(err, InsightsError::Cancelled));
    assert!(harness.summary_entry("acme").is_none());
}

#[tokio::test]
async fn test_prediction_rises_with_tag_overlap() {
    let harness = TestHarness::new();
    let pipeline = pipeline_with_history(&harness);
    seed_candidate(&harness, "cand-match", "New poster", &["summer", "beach", "neon"]);
    seed_candidate(&harness, "cand-miss", "New poster", &["winter"]);
    let cancel = CancellationToken::new();

    let matched = pipeline
        .predict("acme", "cand-match", "designer-1", &cancel)
        .await
        .unwrap();
    let missed = pipeline
        .predict("acme", "cand-miss", "designer-1", &cancel)
        .await
        .unwrap();

    assert_eq!(matched.status, PredictionStatus::Ready);
    assert_eq!(missed.status, PredictionStatus::Ready);

    let matched_signals = matched.signals.as_ref().unwrap();
    assert_eq!(matched_signals.tag_overlap, 2);
    assert_eq!(matched_signals.overlapping_tags, vec!["beach", "summer"]);
    assert!((matched_signals.client_approval_rate - 0.7).abs() < 1e-9);
    assert_eq!(missed.signals.as_ref().unwrap().tag_overlap, 0);

    let p_matched = matched.probability.unwrap();
    let p_missed = missed.probability.unwrap();
    assert!(p_matched > p_missed);
    for p in [p_matched, p_missed] {
        assert!((0.0..=1.0).contains(&p));
    }
    assert_eq!(matched.rationale, RATIONALE_REPLY);
}

#[tokio::test]
async fn test_prediction_uses_cached_summary_phrases() {
    let harness = TestHarness::new();
    let pipeline = pipeline_with_history(&harness);
    seed_candidate(&harness, "cand", "Bold summer poster", &["neon"]);
    let cancel = CancellationToken::new();

    let before = pipeline
        .predict("acme", "cand", "designer-1", &cancel)
        .await
        .unwrap();
    assert_eq!(before.signals.as_ref().unwrap().positive_matches, 0);

    let summary = pipeline.client_summary("acme", &cancel).await.unwrap();
    assert!(STYLE_REPLY.contains(&summary.style_preferences[0]));

    let after = pipeline
        .predict("acme", "cand", "designer-1", &cancel)
        .await
        .unwrap();
    let signals = after.signals.as_ref().unwrap();
    assert_eq!(signals.positive_matches, 2);
    assert_eq!(signals.rejection_matches, 0);
    assert!(after.probability.unwrap() > before.probability.unwrap());
}

#[tokio::test]
async fn test_prediction_statuses_for_unready_submissions() {
    let harness = TestHarness::new();
    let pipeline = pipeline_with_history(&harness);
    let cancel = CancellationToken::new();

    harness.seed(SubmissionBuilder::new("not-run").owner("designer-1").image("a.png"));
    let p = pipeline.predict("acme", "not-run", "designer-1", &cancel).await.unwrap();
    assert_eq!(p.status, PredictionStatus::PendingSignals);
    assert!(p.probability.is_none());
    assert!(p.signals.is_none());

    harness.seed(SubmissionBuilder::new("running").owner("designer-1").image("a.png"));
    harness.put_feature(FeatureBuilder::with_status("running", AnalysisStatus::Pending).build());
    let p = pipeline.predict("acme", "running", "designer-1", &cancel).await.unwrap();
    assert_eq!(p.status, PredictionStatus::PendingSignals);
    assert!(p.probability.is_none());

    harness.seed(SubmissionBuilder::new("broken").owner("designer-1").image("a.png"));
    harness.put_feature(
        FeatureBuilder::with_status("broken", AnalysisStatus::Failed)
            .failure("ocr:Timeout, themes:Timeout")
            .build(),
    );
    let p = pipeline.predict("acme", "broken", "designer-1", &cancel).await.unwrap();
    assert_eq!(p.status, PredictionStatus::PendingSignals);
    assert!(p.rationale.contains("ocr:Timeout"));

    harness.seed(SubmissionBuilder::new("clip").owner("designer-1").video("clip.mp4"));
    harness.put_feature(FeatureBuilder::with_status("clip", AnalysisStatus::NoImages).build());
    let p = pipeline.predict("acme", "clip", "designer-1", &cancel).await.unwrap();
    assert_eq!(p.status, PredictionStatus::MissingHistory);
    assert!(p.probability.is_none());

    // None of these reached the text generator.
    assert_eq!(harness.text.calls(), 0);
}

#[tokio::test]
async fn test_prediction_falls_back_to_template_rationale() {
    let harness = TestHarness::new();
    harness.text.set_mode(TextMode::Failing);
    let pipeline = pipeline_with_history(&harness);
    seed_candidate(&harness, "cand", "New poster", &["summer"]);

    let p = pipeline
        .predict("acme", "cand", "designer-1", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(p.status, PredictionStatus::Ready);
    assert!(p.probability.is_some());
    assert!(p.rationale.starts_with("Estimated approval likelihood is"));
    assert!(p.rationale.contains("summer"));
}

#[tokio::test]
async fn test_prediction_without_text_provider_still_scores() {
    let harness = TestHarness::new();
    harness.text.set_mode(TextMode::NotConfigured);
    let pipeline = pipeline_with_history(&harness);
    seed_candidate(&harness, "cand", "New poster", &["beach"]);

    let p = pipeline
        .predict("acme", "cand", "designer-1", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(p.status, PredictionStatus::Ready);
    assert!(p.rationale.starts_with("Estimated approval likelihood is"));
}

#[tokio::test]
async fn test_prediction_for_someone_elses_submission_is_not_found() {
    let harness = TestHarness::new();
    let pipeline = pipeline_with_history(&harness);
    seed_candidate(&harness, "cand", "New poster", &["summer"]);

    let err = pipeline
        .predict("acme", "cand", "intruder", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, InsightsError::SubmissionNotFound(id) if id == "cand"));

    let err = pipeline
        .predict("acme", "missing", "designer-1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, InsightsError::SubmissionNotFound(_)));
}

#[tokio::test]
async fn test_prediction_for_new_client_uses_neutral_rates() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();
    seed_candidate(&harness, "cand", "First poster", &["summer"]);

    let p = pipeline
        .predict("fresh-client", "cand", "designer-1", &CancellationToken::new())
        .await
        .unwrap();
    let signals = p.signals.unwrap();
    assert_eq!(signals.client_approval_rate, 0.5);
    assert_eq!(signals.global_approval_rate, 0.5);
    assert_eq!(signals.tag_overlap, 0);
    assert!((p.probability.unwrap() - 0.5).abs() < 1e-9);
}
