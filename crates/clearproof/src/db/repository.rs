//! Async repository traits consumed by the analysis and insight services.
//!
//! `Database` implements every trait by running the matching synchronous
//! repo function on the blocking pool via [`Database::call`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{feature_repo, review_repo, submission_repo, summary_repo, Database, DatabaseError};
use crate::model::{ContentFeature, FeatureUpdate, Review, ReviewCounts, Submission, SummaryEntry};

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Loads a submission with its media files, regardless of owner.
    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, DatabaseError>;

    /// Loads a submission only if `user_id` owns it.
    async fn find_submission_for_user(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Submission>, DatabaseError>;

    /// Submission ids whose analysis is missing, failed, or stale.
    async fn find_backfill_candidates(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<String>, DatabaseError>;
}

#[async_trait]
pub trait FeatureRepository: Send + Sync {
    async fn find_feature(&self, submission_id: &str)
        -> Result<Option<ContentFeature>, DatabaseError>;

    async fn find_features(
        &self,
        submission_ids: &[String],
    ) -> Result<Vec<ContentFeature>, DatabaseError>;

    /// Writes the analysis result, returning the stored row.
    async fn upsert_feature(&self, update: &FeatureUpdate)
        -> Result<ContentFeature, DatabaseError>;

    async fn mark_pending(&self, submission_id: &str, at: DateTime<Utc>)
        -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn reviews_for_client(&self, client_id: &str) -> Result<Vec<Review>, DatabaseError>;

    async fn counts_for_client(&self, client_id: &str) -> Result<ReviewCounts, DatabaseError>;

    async fn global_counts(&self) -> Result<ReviewCounts, DatabaseError>;
}

#[async_trait]
pub trait SummaryRepository: Send + Sync {
    async fn find_summary(&self, client_id: &str) -> Result<Option<SummaryEntry>, DatabaseError>;

    async fn upsert_summary(&self, entry: &SummaryEntry) -> Result<(), DatabaseError>;
}

/// Everything the pipeline needs from storage.
pub trait Repository:
    SubmissionRepository + FeatureRepository + ReviewRepository + SummaryRepository
{
}

impl<T> Repository for T where
    T: SubmissionRepository + FeatureRepository + ReviewRepository + SummaryRepository
{
}

#[async_trait]
impl SubmissionRepository for Database {
    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, DatabaseError> {
        let id = id.to_string();
        self.call(move |db| submission_repo::find_by_id(db, &id)).await
    }

    async fn find_submission_for_user(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Submission>, DatabaseError> {
        let id = id.to_string();
        let user_id = user_id.to_string();
        self.call(move |db| submission_repo::find_for_owner(db, &id, &user_id))
            .await
    }

    async fn find_backfill_candidates(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<String>, DatabaseError> {
        self.call(move |db| submission_repo::find_backfill_candidates(db, &stale_before))
            .await
    }
}

#[async_trait]
impl FeatureRepository for Database {
    async fn find_feature(
        &self,
        submission_id: &str,
    ) -> Result<Option<ContentFeature>, DatabaseError> {
        let submission_id = submission_id.to_string();
        self.call(move |db| feature_repo::find_by_submission(db, &submission_id))
            .await
    }

    async fn find_features(
        &self,
        submission_ids: &[String],
    ) -> Result<Vec<ContentFeature>, DatabaseError> {
        if submission_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = submission_ids.to_vec();
        self.call(move |db| feature_repo::find_by_submissions(db, &ids))
            .await
    }

    async fn upsert_feature(
        &self,
        update: &FeatureUpdate,
    ) -> Result<ContentFeature, DatabaseError> {
        let update = update.clone();
        self.call(move |db| feature_repo::upsert(db, &update)).await
    }

    async fn mark_pending(
        &self,
        submission_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let submission_id = submission_id.to_string();
        self.call(move |db| feature_repo::mark_pending(db, &submission_id, &at))
            .await
    }
}

#[async_trait]
impl ReviewRepository for Database {
    async fn reviews_for_client(&self, client_id: &str) -> Result<Vec<Review>, DatabaseError> {
        let client_id = client_id.to_string();
        self.call(move |db| review_repo::find_by_client(db, &client_id))
            .await
    }

    async fn counts_for_client(&self, client_id: &str) -> Result<ReviewCounts, DatabaseError> {
        let client_id = client_id.to_string();
        self.call(move |db| review_repo::counts_for_client(db, &client_id))
            .await
    }

    async fn global_counts(&self) -> Result<ReviewCounts, DatabaseError> {
        self.call(review_repo::global_counts).await
    }
}

#[async_trait]
impl SummaryRepository for Database {
    async fn find_summary(&self, client_id: &str) -> Result<Option<SummaryEntry>, DatabaseError> {
        let client_id = client_id.to_string();
        self.call(move |db| summary_repo::find(db, &client_id)).await
    }

    async fn upsert_summary(&self, entry: &SummaryEntry) -> Result<(), DatabaseError> {
        let entry = entry.clone();
        self.call(move |db| summary_repo::upsert(db, &entry)).await
    }
}
