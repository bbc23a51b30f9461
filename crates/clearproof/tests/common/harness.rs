//! Test harness for isolated pipeline runs.
//!
//! Each `TestHarness` owns an in-memory database, a temporary storage root
//! and scripted providers, so tests never reach the network.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use clearproof::config::{AnalysisConfig, ScoringConfig, SummaryConfig};
use clearproof::db::submission_repo::{self, NewMediaFile, NewSubmission};
use clearproof::db::{feature_repo, review_repo, summary_repo};
use clearproof::model::{AnalysisStatus, ContentFeature, FeatureUpdate, Review, SummaryEntry};
use clearproof::providers::Providers;
use clearproof::storage::LocalFileStorage;
use clearproof::{Database, Pipeline};

use super::builders::SubmissionBuilder;
use super::providers::{ScriptedText, ScriptedVision, TextMode};

/// Bytes written for every test image. Providers are scripted, so the
/// content is never decoded.
const IMAGE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nclearproof-test";

pub struct TestHarness {
    pub temp_dir: TempDir,
    pub db: Database,
    pub storage: Arc<LocalFileStorage>,
    pub vision: Arc<ScriptedVision>,
    pub text: Arc<ScriptedText>,
    pub analysis: AnalysisConfig,
    pub summary: SummaryConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = Arc::new(LocalFileStorage::new(temp_dir.path().join("media")));
        Self {
            db: Database::open_in_memory().expect("Failed to open test database"),
            storage,
            temp_dir,
            vision: Arc::new(ScriptedVision::default()),
            text: Arc::new(ScriptedText::new(TextMode::Fixed)),
            analysis: AnalysisConfig {
                backfill_delay_secs: 0,
                stale_after_secs: 300,
                queue_warning_threshold: 100,
                provider_timeout_secs: 5,
            },
            summary: SummaryConfig::default(),
        }
    }

    pub fn providers(&self) -> Providers {
        Providers {
            ocr: self.vision.clone(),
            themes: self.vision.clone(),
            text: self.text.clone(),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            Arc::new(self.db.clone()),
            self.storage.clone(),
            self.providers(),
            &self.analysis,
            ScoringConfig::default(),
            self.summary,
        )
    }

    /// Writes the submission's media below the storage root and inserts it.
    /// Media file names must be unique within a submission.
    pub fn seed(&self, submission: SubmissionBuilder) {
        let media = submission
            .media
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let stored_path = format!("{}/{}", submission.id, file.file_name);
                let physical = self.storage.root().join(&stored_path);
                std::fs::create_dir_all(physical.parent().unwrap())
                    .expect("Failed to create media directory");
                std::fs::write(&physical, IMAGE_BYTES).expect("Failed to write media file");
                NewMediaFile {
                    id: format!("{}-m{}", submission.id, i),
                    stored_path,
                    content_type: Some(file.content_type.clone()),
                    caption: file.caption.clone(),
                }
            })
            .collect();

        submission_repo::insert(
            &self.db,
            &NewSubmission {
                id: submission.id,
                client_id: submission.client_id,
                owner_user_id: submission.owner_user_id,
                message: submission.message,
                created_at: submission.created_at,
                media,
            },
        )
        .expect("Failed to insert submission");
    }

    pub fn add_review(&self, review: Review) {
        review_repo::insert(&self.db, &review).expect("Failed to insert review");
    }

    pub fn put_feature(&self, update: FeatureUpdate) -> ContentFeature {
        feature_repo::upsert(&self.db, &update).expect("Failed to upsert feature")
    }

    pub fn feature(&self, submission_id: &str) -> Option<ContentFeature> {
        feature_repo::find_by_submission(&self.db, submission_id).expect("Failed to read feature")
    }

    pub fn summary_entry(&self, client_id: &str) -> Option<SummaryEntry> {
        summary_repo::find(&self.db, client_id).expect("Failed to read summary")
    }

    /// Polls until the submission's feature row reaches `status`.
    pub async fn wait_for_status(&self, submission_id: &str, status: AnalysisStatus) -> ContentFeature {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(feature) = self.feature(submission_id) {
                if feature.analysis_status == status {
                    return feature;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "Submission {} did not reach {:?}; last row: {:?}",
                    submission_id,
                    status,
                    self.feature(submission_id)
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
