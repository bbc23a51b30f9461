use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::{FutureExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::aggregator::FeatureAggregator;
use super::queue::AnalysisQueue;
use crate::db::SubmissionRepository;
use crate::error::AnalysisError;
use crate::model::ContentFeature;

/// Long-running consumer of the analysis queue.
///
/// Submissions are processed one at a time. Each one runs under a child of
/// the root token so a single analysis can be cancelled (for example when
/// its submission is deleted) without stopping the loop.
pub struct AnalysisWorker {
    queue: Arc<AnalysisQueue>,
    submissions: Arc<dyn SubmissionRepository>,
    aggregator: Arc<FeatureAggregator>,
    in_flight: Mutex<HashMap<String, CancellationToken>>,
}

impl AnalysisWorker {
    pub fn new(
        queue: Arc<AnalysisQueue>,
        submissions: Arc<dyn SubmissionRepository>,
        aggregator: Arc<FeatureAggregator>,
    ) -> Self {
        Self {
            queue,
            submissions,
            aggregator,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancels the running analysis of `submission_id`, if any.
    pub fn cancel_analysis(&self, submission_id: &str) -> bool {
        match self.in_flight().get(submission_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Loads the submission and runs one analysis pass.
    ///
    /// Returns `Ok(None)` when the submission no longer exists.
    pub async fn process(
        &self,
        submission_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ContentFeature>, AnalysisError> {
        let Some(submission) = self.submissions.find_submission(submission_id).await? else {
            warn!("Submission {} not found, skipping analysis", submission_id);
            return Ok(None);
        };

        self.aggregator
            .analyze_submission(&submission, cancel)
            .await
            .map(Some)
    }

    /// Consumes the queue until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Analysis worker started");
        let mut ids = pin!(self.queue.dequeue(cancel.clone()));

        while let Some(submission_id) = ids.next().await {
            let item_cancel = cancel.child_token();
            self.in_flight()
                .insert(submission_id.clone(), item_cancel.clone());

            let span = info_span!("analysis", submission_id = %submission_id);
            let outcome = AssertUnwindSafe(self.process(&submission_id, &item_cancel))
                .catch_unwind()
                .instrument(span)
                .await;

            self.in_flight().remove(&submission_id);

            match outcome {
                Ok(Ok(Some(feature))) => {
                    debug!(
                        "Submission {} stored as {}",
                        submission_id, feature.analysis_status
                    );
                }
                Ok(Ok(None)) => {}
                Ok(Err(AnalysisError::Cancelled)) if cancel.is_cancelled() => {
                    info!("Analysis of {} interrupted by shutdown", submission_id);
                    break;
                }
                Ok(Err(AnalysisError::Cancelled)) => {
                    info!("Analysis of {} cancelled", submission_id);
                }
                Ok(Err(e)) => {
                    error!("Analysis of {} failed: {}", submission_id, e);
                }
                Err(_) => {
                    error!("Analysis of {} panicked", submission_id);
                }
            }
        }

        info!("Analysis worker stopped");
    }

    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}
