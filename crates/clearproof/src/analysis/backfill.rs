use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::queue::AnalysisQueue;
use crate::db::{DatabaseError, SubmissionRepository};

/// One-shot startup scan that re-enqueues submissions with missing, failed
/// or stale analysis.
pub struct BackfillScanner {
    queue: Arc<AnalysisQueue>,
    submissions: Arc<dyn SubmissionRepository>,
    delay: Duration,
    stale_after: Duration,
}

impl BackfillScanner {
    pub fn new(
        queue: Arc<AnalysisQueue>,
        submissions: Arc<dyn SubmissionRepository>,
        delay: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            queue,
            submissions,
            delay,
            stale_after,
        }
    }

    /// Pending rows last touched before this instant count as stale.
    pub fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let stale_after = chrono::Duration::from_std(self.stale_after)
            .unwrap_or_else(|_| chrono::Duration::zero());
        now - stale_after
    }

    /// Enqueues every candidate once. Returns how many were enqueued.
    pub async fn scan_once(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let candidates = self
            .submissions
            .find_backfill_candidates(self.stale_cutoff(now))
            .await?;

        for id in &candidates {
            self.queue.enqueue(id.as_str());
        }
        Ok(candidates.len())
    }

    /// Waits for the startup delay, scans once, and returns.
    pub async fn run(&self, cancel: CancellationToken) {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Backfill cancelled before it started");
                return;
            }
            _ = tokio::time::sleep(self.delay) => {}
        }

        match self.scan_once(Utc::now()).await {
            Ok(0) => info!("Backfill found nothing to re-analyze"),
            Ok(count) => info!("Backfill enqueued {} submissions", count),
            Err(e) => error!("Backfill scan failed: {}", e),
        }
    }

    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::submission_repo::{self, NewMediaFile, NewSubmission};
    use crate::db::{feature_repo, Database};
    use crate::model::{AnalysisStatus, FeatureUpdate};

    fn seed(db: &Database, id: &str, stored_path: &str) {
        submission_repo::insert(
            db,
            &NewSubmission {
                id: id.to_string(),
                client_id: "acme".to_string(),
                owner_user_id: "user-1".to_string(),
                message: None,
                created_at: Utc::now(),
                media: vec![NewMediaFile {
                    id: format!("{}-m1", id),
                    stored_path: stored_path.to_string(),
                    content_type: None,
                    caption: None,
                }],
            },
        )
        .unwrap();
    }

    fn store(db: &Database, id: &str, status: AnalysisStatus, at: DateTime<Utc>) {
        feature_repo::upsert(
            db,
            &FeatureUpdate {
                submission_id: id.to_string(),
                ocr_text: None,
                theme_tags_json: None,
                analysis_status: status,
                failure_reason: None,
                analyzed_at: at,
                extracted_at: None,
            },
        )
        .unwrap();
    }

    fn scanner(db: &Database, queue: Arc<AnalysisQueue>, delay: Duration) -> BackfillScanner {
        BackfillScanner::new(queue, Arc::new(db.clone()), delay, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_scan_selects_missing_failed_and_stale() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        seed(&db, "missing", "a.png");
        seed(&db, "failed", "b.png");
        seed(&db, "stale", "c.png");
        seed(&db, "fresh", "d.png");
        seed(&db, "done", "e.png");
        seed(&db, "video", "f.mp4");
        store(&db, "failed", AnalysisStatus::Failed, now);
        store(&db, "stale", AnalysisStatus::Pending, now - chrono::Duration::minutes(10));
        store(&db, "fresh", AnalysisStatus::Pending, now - chrono::Duration::minutes(1));
        store(&db, "done", AnalysisStatus::Completed, now - chrono::Duration::days(3));

        let queue = Arc::new(AnalysisQueue::new(100));
        let count = scanner(&db, Arc::clone(&queue), Duration::ZERO)
            .scan_once(now)
            .await
            .unwrap();
        assert_eq!(count, 3);

        let cancel = CancellationToken::new();
        let mut ids = Vec::new();
        while !queue.is_empty() {
            ids.extend(queue.next(&cancel).await);
        }
        ids.sort();
        assert_eq!(ids, vec!["failed", "missing", "stale"]);
    }

    #[tokio::test]
    async fn test_run_honours_cancel_during_delay() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "missing", "a.png");

        let queue = Arc::new(AnalysisQueue::new(100));
        let cancel = CancellationToken::new();
        let handle = Arc::new(scanner(&db, Arc::clone(&queue), Duration::from_secs(3600)))
            .spawn(cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_run_scans_once_after_delay() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "missing", "a.png");

        let queue = Arc::new(AnalysisQueue::new(100));
        let handle = Arc::new(scanner(&db, Arc::clone(&queue), Duration::from_millis(10)))
            .spawn(CancellationToken::new());

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(queue.len(), 1);
    }
}
