//! Wiring of the analysis and insight services behind one handle.

pub mod error;

use std::sync::Arc;

use chrono::Utc;
use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::analysis::{AnalysisQueue, AnalysisWorker, BackfillScanner, FeatureAggregator, MediaAnalyzer};
use crate::config::{AnalysisConfig, Config, ScoringConfig, SummaryConfig};
use crate::db::{Database, FeatureRepository, Repository, SubmissionRepository};
use crate::error::InsightsError;
use crate::insights::{ApprovalPrediction, ApprovalScorer, ClientSummary, SummaryCache};
use crate::providers::Providers;
use crate::storage::{FileStorage, LocalFileStorage};

pub use error::PipelineError;

/// Background tasks started by [`Pipeline::start`].
pub struct PipelineHandles {
    pub worker: JoinHandle<()>,
    pub backfill: JoinHandle<()>,
}

impl PipelineHandles {
    /// Waits for both tasks to finish. Cancel the token passed to `start`
    /// first, otherwise the worker runs forever.
    pub async fn join(self) {
        if let Err(e) = self.backfill.await {
            error!("Backfill task failed: {}", e);
        }
        if let Err(e) = self.worker.await {
            error!("Analysis worker task failed: {}", e);
        }
        info!("Pipeline stopped");
    }
}

pub struct Pipeline {
    queue: Arc<AnalysisQueue>,
    worker: Arc<AnalysisWorker>,
    backfill: Arc<BackfillScanner>,
    submissions: Arc<dyn SubmissionRepository>,
    features: Arc<dyn FeatureRepository>,
    summaries: Arc<SummaryCache>,
    scorer: ApprovalScorer,
}

impl Pipeline {
    /// Production constructor: providers and storage come from config.
    pub fn from_config(config: &Config, db: Database) -> Result<Self, PipelineError> {
        let providers =
            Providers::from_config(&config.providers, config.analysis.provider_timeout())?;
        let storage = Arc::new(LocalFileStorage::new(config.resolved_storage_root()));
        Ok(Self::new(
            Arc::new(db),
            storage,
            providers,
            &config.analysis,
            config.scoring,
            config.summary,
        ))
    }

    /// Builds the pipeline over any repository implementation.
    pub fn new<R: Repository + 'static>(
        repo: Arc<R>,
        storage: Arc<dyn FileStorage>,
        providers: Providers,
        analysis: &AnalysisConfig,
        scoring: ScoringConfig,
        summary: SummaryConfig,
    ) -> Self {
        let queue = Arc::new(AnalysisQueue::new(analysis.queue_warning_threshold));

        let analyzer = MediaAnalyzer::new(storage, providers.ocr, providers.themes);
        let aggregator = Arc::new(FeatureAggregator::new(analyzer, repo.clone()));
        let worker = Arc::new(AnalysisWorker::new(
            Arc::clone(&queue),
            repo.clone(),
            aggregator,
        ));
        let backfill = Arc::new(BackfillScanner::new(
            Arc::clone(&queue),
            repo.clone(),
            analysis.backfill_delay(),
            analysis.stale_after(),
        ));

        let summaries = Arc::new(SummaryCache::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            providers.text.clone(),
            summary.always_refresh,
        ));
        let scorer = ApprovalScorer::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            Arc::clone(&summaries),
            providers.text,
            scoring,
        );

        Self {
            queue,
            worker,
            backfill,
            submissions: repo.clone(),
            features: repo,
            summaries,
            scorer,
        }
    }

    /// Spawns the analysis worker and the one-shot backfill scan.
    pub fn start(&self, cancel: &CancellationToken) -> PipelineHandles {
        info!("Starting analysis pipeline");
        PipelineHandles {
            worker: Arc::clone(&self.worker).spawn(cancel.clone()),
            backfill: Arc::clone(&self.backfill).spawn(cancel.clone()),
        }
    }

    /// Queues a newly created submission for analysis.
    pub fn submit(&self, submission_id: &str) {
        self.queue.enqueue(submission_id);
    }

    /// Re-queues a submission owned by `user_id`.
    ///
    /// The feature row is marked pending first; its previous OCR text and
    /// tags stay in place until the new pass overwrites them.
    pub async fn request_reanalysis(
        &self,
        submission_id: &str,
        user_id: &str,
    ) -> Result<(), PipelineError> {
        if self
            .submissions
            .find_submission_for_user(submission_id, user_id)
            .await?
            .is_none()
        {
            return Err(PipelineError::SubmissionNotFound(submission_id.to_string()));
        }

        self.features.mark_pending(submission_id, Utc::now()).await?;
        self.queue.enqueue(submission_id);
        info!("Re-analysis requested for submission {}", submission_id);
        Ok(())
    }

    /// Cancels an analysis in progress, e.g. when its submission is deleted.
    pub fn cancel_analysis(&self, submission_id: &str) -> bool {
        self.worker.cancel_analysis(submission_id)
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub async fn client_summary(
        &self,
        client_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ClientSummary, InsightsError> {
        self.summaries.get_or_refresh(client_id, cancel).await
    }

    pub async fn predict(
        &self,
        client_id: &str,
        submission_id: &str,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ApprovalPrediction, InsightsError> {
        self.scorer
            .predict(client_id, submission_id, user_id, cancel)
            .await
    }
}
